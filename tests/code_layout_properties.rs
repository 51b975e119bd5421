use proptest::prelude::*;
use slidepress::code::{estimate_code_height, needs_page_break, wrapped_line_count, MIN_HEIGHT};

proptest! {
    #[test]
    fn estimate_never_below_floor(text in "(?s).{0,400}") {
        prop_assert!(estimate_code_height(&text) >= MIN_HEIGHT);
    }

    #[test]
    fn estimate_grows_with_appended_lines(text in "[a-z \n]{0,300}", extra in "[a-z]{1,200}") {
        let longer = format!("{}\n{}", text, extra);
        prop_assert!(estimate_code_height(&longer) >= estimate_code_height(&text));
        prop_assert!(wrapped_line_count(&longer) > wrapped_line_count(&text));
    }

    #[test]
    fn every_source_line_counts_at_least_once(lines in prop::collection::vec("[a-z]{1,200}", 1..20)) {
        let text = lines.join("\n");
        prop_assert!(wrapped_line_count(&text) >= lines.len());
    }

    #[test]
    fn small_blocks_never_force_a_break(available in -500.0f32..1000.0, estimated in 0.0f32..=200.0) {
        prop_assert!(!needs_page_break(available, estimated));
    }

    #[test]
    fn roomy_pages_never_force_a_break(available in 150.0f32..2000.0, estimated in 0.0f32..5000.0) {
        prop_assert!(!needs_page_break(available, estimated));
    }

    #[test]
    fn large_blocks_near_the_bottom_break(available in -100.0f32..149.0, estimated in 201.0f32..5000.0) {
        prop_assert!(needs_page_break(available, estimated));
    }
}
