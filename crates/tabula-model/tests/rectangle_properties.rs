use proptest::prelude::*;
use tabula_model::{normalize_rectangle, CellRef, RectangleError};

fn a1(row: u32, col: u32) -> String {
    CellRef::new(row, col).to_a1()
}

proptest! {
    #[test]
    fn corner_order_does_not_matter(
        r1 in 0u32..2000, c1 in 0u32..200,
        r2 in 0u32..2000, c2 in 0u32..200,
    ) {
        prop_assume!(r1 != r2 || c1 != c2);

        let forward = normalize_rectangle(&format!("Data!{}:{}", a1(r1, c1), a1(r2, c2))).unwrap();
        let backward = normalize_rectangle(&format!("Data!{}:{}", a1(r2, c2), a1(r1, c1))).unwrap();
        let crossed = normalize_rectangle(&format!("Data!{}:{}", a1(r1, c2), a1(r2, c1))).unwrap();

        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(&forward, &crossed);
        prop_assert!(forward.range.start.row <= forward.range.end.row);
        prop_assert!(forward.range.start.col <= forward.range.end.col);
    }

    #[test]
    fn normalization_is_idempotent(
        r1 in 0u32..2000, c1 in 0u32..200,
        r2 in 0u32..2000, c2 in 0u32..200,
        anchored in any::<bool>(),
    ) {
        prop_assume!(r1 != r2 || c1 != c2);

        let (a, b) = (a1(r1, c1), a1(r2, c2));
        let input = if anchored {
            format!("'My Data'!${}:{}", a, b)
        } else {
            format!("'My Data'!{}:{}", a, b)
        };
        let once = normalize_rectangle(&input).unwrap();
        let twice = normalize_rectangle(&once.to_string()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn single_cells_are_rejected(r in 0u32..2000, c in 0u32..200) {
        let cell = a1(r, c);
        let bare = normalize_rectangle(&format!("Data!{cell}"));
        let doubled = normalize_rectangle(&format!("Data!{cell}:{cell}"));
        prop_assert!(matches!(bare, Err(RectangleError::SingleCell(_))));
        prop_assert!(matches!(doubled, Err(RectangleError::SingleCell(_))));
    }
}
