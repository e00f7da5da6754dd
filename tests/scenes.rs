use std::path::PathBuf;

use rs_ngp::core::api::{RenderMode, SceneDescription};
use rs_ngp::core::ngp::Spectrum;
use rs_ngp::core::parser::parse_file;
use rs_ngp::integrators::volume::VolumeRenderer;

fn scene(name: &str) -> SceneDescription {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "scenes", name].iter().collect();
    let statements = parse_file(&path).unwrap();
    SceneDescription::from_statements(&statements).unwrap()
}

#[test]
fn sphere_scene() {
    let scene = scene("sphere.ngp");
    assert!(scene.renderer.accelerated);
    assert_eq!(scene.renderer.grid_size, 64);
    assert_eq!(scene.render.mode, RenderMode::Inference);
    assert_eq!(scene.camera.width, 128);
    assert!(scene.background.is_some());
    assert_eq!(scene.training_views.len(), 4);
}

#[test]
fn grid_scene_renders_small() {
    let mut scene = scene("grid.ngp");
    assert!(!scene.renderer.accelerated);
    assert_eq!(scene.render.bg_color, Some(Spectrum::new(0.0)));
    scene.render.num_uniform_steps = 16;
    scene.render.num_importance_steps = 16;
    let mut renderer = VolumeRenderer::new(scene.renderer).unwrap();
    // a handful of pixels around the image center
    let (o, d) = scene.camera.generate_rays();
    let w: usize = scene.camera.width as usize;
    let center: usize = (scene.camera.height as usize / 2) * w + w / 2;
    let out = renderer
        .render(
            scene.field.as_ref(),
            None,
            &o[center - 2..center + 2],
            &d[center - 2..center + 2],
            &scene.render,
        )
        .unwrap();
    assert_eq!(out.len(), 4);
    for i in 0..4 {
        assert!(out.weight_sum[i] > 0.0);
        assert!(out.weight_sum[i] <= 1.0 + 1e-4);
        for c in 0..3 {
            assert!(out.image[i][c] >= 0.0 && out.image[i][c] <= 1.0 + 1e-4);
        }
    }
}
