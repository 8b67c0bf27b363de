use super::*;

#[test]
fn binary_labels_use_the_palette_ends() {
    let style = MarkerStyle::fit(&[0.0, 1.0, 0.0], 72.0);
    assert_eq!(style.color(0.0), DARK2[0]);
    assert_eq!(style.color(1.0), DARK2[7]);
    assert_eq!(style.color(0.5), DARK2[4]);
}

#[test]
fn constant_labels_share_one_color() {
    let style = MarkerStyle::fit(&[3.0, 3.0], 72.0);
    assert_eq!(style.color(3.0), DARK2[0]);
}

#[test]
fn outliers_get_larger_markers() {
    let style = MarkerStyle::fit(&[0.0, 1.0], 72.0);
    let inlier = style.radius_px(0.0);
    let outlier = style.radius_px(1.0);
    assert!(outlier > inlier * 3.0);
    assert!((outlier - 0.5 * 10.1f64.sqrt()).abs() < 1e-12);
    assert!(inlier >= MIN_RADIUS_PX);

    let hi_dpi = MarkerStyle::fit(&[0.0, 1.0], 144.0);
    assert!((hi_dpi.radius_px(1.0) - 2.0 * outlier).abs() < 1e-12);
}
