use super::*;
use proptest::prelude::*;

#[test]
fn first_key_and_appends_walk_the_integer_head() {
    assert_eq!(key_between(None, None).unwrap(), "a0");
    assert_eq!(key_between(Some("a0"), None).unwrap(), "a1");
    assert_eq!(key_between(Some("az"), None).unwrap(), "b00");
    assert_eq!(key_between(None, Some("a0")).unwrap(), "Zz");
    assert_eq!(key_between(None, Some("b00")).unwrap(), "az");
}

#[test]
fn between_neighbours_uses_the_fraction() {
    assert_eq!(key_between(Some("a0"), Some("a1")).unwrap(), "a0V");
    assert_eq!(key_between(Some("a0V"), Some("a1")).unwrap(), "a0l");
    assert_eq!(key_between(Some("a0"), Some("a0V")).unwrap(), "a0G");
    assert_eq!(key_between(Some("a1"), Some("a3")).unwrap(), "a2");
}

#[test]
fn rejects_out_of_order_and_malformed_bounds() {
    assert_eq!(
        key_between(Some("a1"), Some("a0")).unwrap_err(),
        OrderKeyError::OutOfOrder
    );
    assert_eq!(
        key_between(Some("a1"), Some("a1")).unwrap_err(),
        OrderKeyError::OutOfOrder
    );
    assert_eq!(
        key_between(Some("a00"), None).unwrap_err(),
        OrderKeyError::TrailingZero
    );
    assert_eq!(
        key_between(Some("!"), None).unwrap_err(),
        OrderKeyError::InvalidHead
    );
}

#[test]
fn store_level_validation_is_permissive() {
    assert!(validate_order_key("a").is_ok());
    assert!(validate_order_key("0001-x").is_ok());
    assert_eq!(validate_order_key("").unwrap_err(), OrderKeyError::Empty);
    assert_eq!(
        validate_order_key("a b").unwrap_err(),
        OrderKeyError::InvalidChar { index: 1 }
    );
    assert_eq!(
        validate_order_key(&"k".repeat(300)).unwrap_err(),
        OrderKeyError::TooLong
    );
}

#[test]
fn n_keys_between_is_sorted_and_bounded() {
    let keys = n_keys_between(Some("a0"), Some("a1"), 10).unwrap();
    assert_eq!(keys.len(), 10);
    assert!(keys.windows(2).all(|w| compare(&w[0], &w[1]) == Ordering::Less));
    assert!(compare("a0", &keys[0]) == Ordering::Less);
    assert!(compare(&keys[9], "a1") == Ordering::Less);

    let tail = n_keys_between(None, None, 3).unwrap();
    assert_eq!(tail, vec!["a0", "a1", "a2"]);

    let head = n_keys_between(None, Some("a0"), 2).unwrap();
    assert_eq!(head, vec!["Zy", "Zz"]);
}

#[test]
fn thousand_appends_stay_short() {
    let mut last: Option<String> = None;
    for _ in 0..1000 {
        last = Some(key_between(last.as_deref(), None).unwrap());
    }
    assert!(last.unwrap().len() <= 3);
}

proptest! {
    #[test]
    fn generated_keys_always_land_strictly_between(choices in prop::collection::vec(0usize..1000, 1..80)) {
        let mut keys: Vec<String> = Vec::new();
        for choice in choices {
            let slot = if keys.is_empty() { 0 } else { choice % (keys.len() + 1) };
            let lower = if slot == 0 { None } else { Some(keys[slot - 1].as_str()) };
            let upper = keys.get(slot).map(String::as_str);
            let key = key_between(lower, upper).unwrap();
            prop_assert!(validate_generated_key(&key).is_ok());
            if let Some(lower) = lower {
                prop_assert_eq!(compare(lower, &key), Ordering::Less);
            }
            if let Some(upper) = upper {
                prop_assert_eq!(compare(&key, upper), Ordering::Less);
            }
            keys.insert(slot, key);
        }
        prop_assert!(keys.windows(2).all(|w| compare(&w[0], &w[1]) == Ordering::Less));
    }
}
