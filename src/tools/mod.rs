use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Calculate reciprocal sum of reciprocals.
/// Accepts >=2 arguments.
/// For resistances this is the resistance of the branches connected in parallel,
/// e.g. the convective and radiative film of one surface.
macro_rules! reciprocal_sum {
    ($head:expr, $( $tail:expr ),+) => {
        ($head.recip() $(+ $tail.recip())*).recip()
    }
}
pub(crate) use reciprocal_sum;

/// Look up a named object of a loaded document, the error names what was missing.
pub(crate) fn get<K, V, Q>(h: &BTreeMap<K, V>, key: &Q, label: &str) -> anyhow::Result<V>
where
    K: Borrow<Q> + Ord,
    Q: Ord + fmt::Debug + ?Sized,
    V: Clone,
{
    h.get(key)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Could not find {} {:?}", label, key))
}

/// Strip everything but ASCII letters and digits from a name.
/// Returns `None` if nothing is left.
pub fn sanitize_name(value: &str) -> Option<String> {
    let name: String = value.chars().filter(char::is_ascii_alphanumeric).collect();
    if name.is_empty() || name == "None" {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::prop;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test]
    fn reciprocal_sum_film_coefficients() {
        // 1 / (1/0.04 + 1/0.2) m^2.K/W, convection 25 W/m^2.K and radiation 5 W/m^2.K
        assert_relative_eq!(reciprocal_sum!(0.04f64, 0.2f64), 1.0 / 30.0, max_relative = 1e-14);
    }

    #[test]
    fn reciprocal_sum_four_identical() {
        assert_eq!(reciprocal_sum!(2.0f64, 2.0f64, 2.0f64, 2.0f64), 0.5);
    }

    #[proptest]
    fn reciprocal_sum_pairwise_vs_all(
        #[strategy(prop::collection::vec(1e-3f64..1e3f64, 2..50))] values: Vec<f64>,
    ) {
        let pairwise = values
            .iter()
            .copied()
            .reduce(|a, b| reciprocal_sum!(a, b))
            .unwrap();
        let expected = values.iter().map(|x| x.recip()).sum::<f64>().recip();
        assert_relative_eq!(pairwise, expected, max_relative = 1e-12);
    }

    #[test]
    fn get_names_missing_object() {
        let map = BTreeMap::from([("brick".to_string(), 1)]);
        assert_eq!(get(&map, "brick", "material").unwrap(), 1);

        let message = format!("{}", get(&map, "wool", "material").unwrap_err());
        assert!(message.contains("material"));
        assert!(message.contains("wool"));
    }

    #[test_case("Outer Wall #1", Some("OuterWall1"); "spaces and punctuation")]
    #[test_case("wall_north", Some("wallnorth"); "underscore")]
    #[test_case("---", None; "nothing left")]
    #[test_case("None", None; "literal none")]
    fn sanitize(input: &str, expected: Option<&str>) {
        assert_eq!(sanitize_name(input).as_deref(), expected);
    }
}
