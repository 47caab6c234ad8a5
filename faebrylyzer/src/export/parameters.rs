//! Markdown report of every narrowed module parameter.

use crate::design::Design;

/// One table row per module parameter that is neither `Tbd` nor `Any`.
pub fn parameters_markdown(design: &Design) -> String {
    let mut out = String::from("# Parameters\n\n| Module | Parameter | Value |\n| --- | --- | --- |\n");
    let mut rows = 0;
    for module in design.walk_modules() {
        let path = design.path(module);
        for (name, id) in &design.node(module).params {
            let value = design.params.value(*id);
            if value.is_unconstrained() {
                continue;
            }
            out.push_str(&format!("| {} | {} | {} |\n", path, name, value.to_string().replace('|', "\\|")));
            rows += 1;
        }
    }
    tracing::debug!("Parameter report has {} rows", rows);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::ModuleKind;
    use crate::library::Resistor;
    use crate::units::Quantity;

    #[test]
    fn test_only_narrowed_parameters_listed() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let r = Resistor::new(&mut d, root, "r1").unwrap();
        r.set_resistance(&mut d, Quantity::ohms(4.7e3)).unwrap();
        d.params.replace_tbd_with_any();

        let md = parameters_markdown(&d);
        assert!(md.starts_with("# Parameters\n"));
        assert!(md.contains("| board.r1 | resistance | 4.7kΩ |"), "{}", md);
        assert!(!md.contains("rated_power"));
    }
}
