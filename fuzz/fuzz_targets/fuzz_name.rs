#![no_main]

//! Fuzz target for qualifier ordering
//!
//! Arbitrary qualifiers must keep both orders consistent: the partial
//! order irreflexive and asymmetric, the total order antisymmetric.

use graph_injector::Name;
use libfuzzer_sys::fuzz_target;
use std::cmp::Ordering;

fuzz_target!(|input: (String, String, String)| {
    let (a, b, c) = input;
    let names = [Name::new(a), Name::new(b), Name::new(c), Name::DEFAULT, Name::ANY];

    for x in &names {
        assert!(!x.more_qualified_than(x));
        assert_eq!(x.specificity_cmp(x), Ordering::Equal);
        assert!(Name::ANY.is_compatible_with(x));
        assert!(x.is_compatible_with(x));

        for y in &names {
            assert!(!(x.more_qualified_than(y) && y.more_qualified_than(x)));
            assert_eq!(x.specificity_cmp(y), y.specificity_cmp(x).reverse());
            if x.specificity_cmp(y) == Ordering::Equal {
                assert_eq!(x, y);
            }

            for z in &names {
                if x.specificity_cmp(y) == Ordering::Less && y.specificity_cmp(z) == Ordering::Less {
                    assert_eq!(x.specificity_cmp(z), Ordering::Less);
                }
            }
        }
    }
});
