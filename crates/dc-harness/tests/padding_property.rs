use dc_types::{TestConfig, padded_output_extent};
use proptest::prelude::*;

proptest! {
    /// The loader's stored expectation must equal the closed-form padding
    /// rule for any input resolution and scale.
    #[test]
    fn expected_output_matches_closed_form(
        input_x in 1_u32..4096,
        input_y in 1_u32..4096,
        scale in 1_u32..9,
    ) {
        let config = TestConfig {
            input_res_x: input_x,
            input_res_y: input_y,
            downsample_scale: scale,
            ..TestConfig::default()
        };
        let (out_x, out_y) = config.expected_output_resolution().expect("extent");
        prop_assert_eq!(out_x, ((input_x / scale) + 3) / 4 * 4);
        prop_assert_eq!(out_y, ((input_y / scale) + 3) / 4 * 4);
    }

    #[test]
    fn padded_extent_is_a_multiple_of_four_and_monotone(
        input in 1_u32..4096,
        scale in 1_u32..9,
    ) {
        let padded = padded_output_extent(input, scale).expect("extent");
        prop_assert_eq!(padded % 4, 0);
        // Padding never rounds below the downsampled dimension.
        prop_assert!(padded + 4 > input / scale);
    }
}
