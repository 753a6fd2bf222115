use omnigen::{Constraint, Dimensions, OmniError, ParamValue};
use proptest::prelude::*;

fn flux_like() -> Constraint {
    Constraint::Dimensions(
        Dimensions::new(64 * 64, 2048 * 2048, 9.0 / 21.0, 21.0 / 9.0).with_preset("Square 1K", "1024x1024"),
    )
}

#[test]
fn presets_resolve_to_their_size() {
    assert_eq!(
        flux_like().validate(&"Square 1K".into()).unwrap(),
        ParamValue::from("1024x1024")
    );
}

#[test]
fn special_values_bypass_the_range() {
    let c = Constraint::range_with_specials(1.0, 10.0, vec![-1.0]);
    assert_eq!(c.validate(&ParamValue::Int(-1)).unwrap(), ParamValue::Int(-1));
    let err = c.validate(&ParamValue::Int(0)).unwrap_err();
    assert_eq!(
        err.to_string(),
        OmniError::ConstraintViolation("Must be between 1 and 10 or one of [-1], got 0".into()).to_string()
    );
}

proptest! {
    #[test]
    fn in_range_values_pass_unchanged(v in 0.0f64..=2.0) {
        let c = Constraint::range(0.0, 2.0);
        prop_assert_eq!(c.validate(&ParamValue::Float(v)).unwrap(), ParamValue::Float(v));
    }

    #[test]
    fn out_of_range_values_are_violations(v in prop_oneof![-100.0f64..-0.001, 2.001f64..100.0]) {
        let c = Constraint::range(0.0, 2.0);
        let err = c.validate(&ParamValue::Float(v)).unwrap_err();
        prop_assert!(matches!(err, OmniError::ConstraintViolation(_)));
    }

    #[test]
    fn steps_accept_exact_multiples(k in 0u32..20) {
        let c = Constraint::stepped_range(0.0, 1.0, 0.05);
        let v = f64::from(k) * 0.05;
        prop_assert!(c.validate(&ParamValue::Float(v)).is_ok());
    }

    #[test]
    fn dimensions_canonicalize_idempotently(w in 64u64..=2048, h in 64u64..=2048, upper in any::<bool>()) {
        let ratio = w as f64 / h as f64;
        prop_assume!((9.0 / 21.0..=21.0 / 9.0).contains(&ratio));
        let c = flux_like();
        let sep = if upper { "X" } else { "x" };
        let once = c.validate(&ParamValue::Str(format!("{w}{sep}{h}"))).unwrap();
        prop_assert_eq!(&once, &ParamValue::Str(format!("{w}x{h}")));
        prop_assert_eq!(c.validate(&once).unwrap(), once);
    }
}
