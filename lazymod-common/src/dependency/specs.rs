// lazymod-common/src/dependency/specs.rs
//! Conversion of the name lists accepted by `define` and `require`: a single
//! name or spec, or any list of spec-like items.

use super::definition::DependencySpec;

pub trait IntoSpecs {
    fn into_specs(self) -> Vec<DependencySpec>;
}

impl IntoSpecs for &str {
    fn into_specs(self) -> Vec<DependencySpec> {
        vec![DependencySpec::new(self)]
    }
}

impl IntoSpecs for String {
    fn into_specs(self) -> Vec<DependencySpec> {
        vec![DependencySpec::new(self)]
    }
}

impl IntoSpecs for &String {
    fn into_specs(self) -> Vec<DependencySpec> {
        vec![DependencySpec::new(self.as_str())]
    }
}

impl IntoSpecs for DependencySpec {
    fn into_specs(self) -> Vec<DependencySpec> {
        vec![self]
    }
}

impl<S: Into<DependencySpec>, const N: usize> IntoSpecs for [S; N] {
    fn into_specs(self) -> Vec<DependencySpec> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<S: Into<DependencySpec>> IntoSpecs for Vec<S> {
    fn into_specs(self) -> Vec<DependencySpec> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<'a, S> IntoSpecs for &'a [S]
where
    &'a S: Into<DependencySpec>,
{
    fn into_specs(self) -> Vec<DependencySpec> {
        self.iter().map(Into::into).collect()
    }
}

impl<'a, S> IntoSpecs for &'a Vec<S>
where
    &'a S: Into<DependencySpec>,
{
    fn into_specs(self) -> Vec<DependencySpec> {
        self.as_slice().into_specs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(specs: Vec<DependencySpec>) -> Vec<String> {
        specs.into_iter().map(|spec| spec.target).collect()
    }

    #[test]
    fn single_names_become_one_spec() {
        assert_eq!(targets("A".into_specs()), ["A"]);
        assert_eq!(targets(String::from("B").into_specs()), ["B"]);
        assert_eq!(targets(DependencySpec::new("C").into_specs()), ["C"]);
    }

    #[test]
    fn lists_keep_their_order() {
        assert_eq!(targets(["B", "A"].into_specs()), ["B", "A"]);

        let owned = vec!["X".to_string(), "Y".to_string()];
        assert_eq!(targets((&owned).into_specs()), ["X", "Y"]);
        assert_eq!(targets(owned.into_specs()), ["X", "Y"]);

        let aliased = [("A", "first")].into_specs();
        assert_eq!(aliased[0].alias, "first");
        assert!(Vec::<DependencySpec>::new().into_specs().is_empty());
    }
}
