//! Renderer configuration and the conversion of parsed scene
//! statements into renderer objects.
//!
//! A scene file is a list of statements:
//!
//! ```text
//! Renderer "bool accelerated" "true" "float bound" 1
//! Render "string mode" "inference"
//! Camera "point3 eye" [ 0 0 3 ] "float fov" 40
//! Field "sphere" "float radius" 0.5
//! Background "sky"
//! TrainingView "point3 eye" [ 3 0 0 ]
//! ```

// std
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
// ngp
use crate::core::camera::{CameraPose, Intrinsics, PinholeCamera};
use crate::core::error::{NgpError, Result};
use crate::core::field::{Background, RadianceField};
use crate::core::geometry::{Bounds3f, Point3f, Vector3f};
use crate::core::morton::MORTON_MAX_COORD;
use crate::core::ngp::{Float, Spectrum};
use crate::core::paramset::ParamSet;
use crate::fields::background::{ConstantBackground, SkyBackground};
use crate::fields::grid::GridDensityField;
use crate::fields::homogeneous::HomogeneousSphere;

/// Settings fixed for the lifetime of a renderer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RendererOptions {
    /// scene extent `[-bound, bound]^3`
    pub bound: Float,
    /// use the occupancy grid
    pub accelerated: bool,
    pub density_scale: Float,
    pub min_near: Float,
    pub density_thresh: Float,
    /// radius of the background sphere, `<= 0` disables the model
    pub bg_radius: Float,
    pub grid_size: u32,
    pub aabb_train: Bounds3f,
    pub aabb_infer: Bounds3f,
    pub seed: u64,
    /// worker threads for staged rendering, 0 for one per CPU
    pub num_threads: u8,
    pub update_decay: Float,
}

impl Default for RendererOptions {
    fn default() -> Self {
        RendererOptions::new(1.0)
    }
}

impl RendererOptions {
    pub fn new(bound: Float) -> Self {
        RendererOptions {
            bound,
            accelerated: false,
            density_scale: 1.0,
            min_near: 0.2,
            density_thresh: 0.01,
            bg_radius: -1.0,
            grid_size: 128,
            aabb_train: Bounds3f::cube(bound),
            aabb_infer: Bounds3f::cube(bound),
            seed: 0,
            num_threads: 0,
            update_decay: 0.95,
        }
    }
    pub fn validate(&self) -> Result<()> {
        if !(self.bound > 0.0) || !self.bound.is_finite() {
            return Err(NgpError::InvalidBound(self.bound));
        }
        if self.grid_size < 2
            || self.grid_size > MORTON_MAX_COORD
            || !self.grid_size.is_power_of_two()
        {
            return Err(NgpError::InvalidConfig(format!(
                "grid_size has to be a power of two between 2 and {}, got {}",
                MORTON_MAX_COORD, self.grid_size
            )));
        }
        if !(self.density_scale > 0.0) {
            return Err(NgpError::InvalidConfig(format!(
                "density_scale has to be positive, got {}",
                self.density_scale
            )));
        }
        if !(self.min_near >= 0.0) {
            return Err(NgpError::InvalidConfig(format!(
                "min_near can't be negative, got {}",
                self.min_near
            )));
        }
        if !(0.0..=1.0).contains(&self.update_decay) {
            return Err(NgpError::InvalidConfig(format!(
                "update_decay has to lie in [0, 1], got {}",
                self.update_decay
            )));
        }
        for (name, aabb) in [("aabb_train", &self.aabb_train), ("aabb_infer", &self.aabb_infer)] {
            if !aabb.is_valid() {
                return Err(NgpError::InvalidConfig(format!(
                    "{} {:?} is degenerate",
                    name, aabb
                )));
            }
        }
        Ok(())
    }
    /// Options of a `Renderer` statement.
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let bound: Float = params.find_one_float("bound", 1.0);
        let mut options = RendererOptions::new(bound);
        options.accelerated = params.find_one_bool("accelerated", options.accelerated);
        options.density_scale = params.find_one_float("density_scale", options.density_scale);
        options.min_near = params.find_one_float("min_near", options.min_near);
        options.density_thresh = params.find_one_float("density_thresh", options.density_thresh);
        options.bg_radius = params.find_one_float("bg_radius", options.bg_radius);
        options.grid_size = non_negative(params, "grid_size", options.grid_size as i32)? as u32;
        options.seed = non_negative(params, "seed", 0)? as u64;
        options.num_threads = non_negative(params, "nthreads", 0)?.min(u8::MAX as i32) as u8;
        options.update_decay = params.find_one_float("update_decay", options.update_decay);
        for (name, aabb) in [
            ("aabb_train", &mut options.aabb_train),
            ("aabb_infer", &mut options.aabb_infer),
        ] {
            let corners: Vec<Point3f> = params.find_point3f(name);
            match corners.len() {
                0 => {}
                2 => *aabb = Bounds3f::new(corners[0], corners[1]),
                n => {
                    return Err(NgpError::Parse(format!(
                        "{} needs two corner points, {} given",
                        name, n
                    )));
                }
            }
        }
        options.validate()?;
        Ok(options)
    }
}

fn non_negative(params: &ParamSet, name: &str, d: i32) -> Result<i32> {
    let v: i32 = params.find_one_int(name, d);
    if v < 0 {
        Err(NgpError::Parse(format!("{} can't be negative, got {}", name, v)))
    } else {
        Ok(v)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenderMode {
    /// random importance samples, capacity limited marching
    Training,
    /// deterministic sampling, alive ray compaction
    Inference,
}

/// Settings of a single render call.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub num_uniform_steps: usize,
    pub num_importance_steps: usize,
    pub perturb: bool,
    pub max_steps: u32,
    pub force_all_rays: bool,
    pub staged: bool,
    pub max_batch_size: usize,
    pub dt_gamma: Float,
    pub bg_color: Option<Spectrum>,
    pub mode: RenderMode,
    pub cal_dist_loss: bool,
    /// checked between marching steps and between chunks
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            num_uniform_steps: 128,
            num_importance_steps: 128,
            perturb: false,
            max_steps: 1024,
            force_all_rays: false,
            staged: false,
            max_batch_size: 4096,
            dt_gamma: 0.0,
            bg_color: None,
            mode: RenderMode::Inference,
            cal_dist_loss: false,
            cancel: None,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<()> {
        if self.num_importance_steps > 0 && self.num_uniform_steps < 3 {
            return Err(NgpError::InvalidConfig(format!(
                "importance sampling needs at least 3 uniform steps, got {}",
                self.num_uniform_steps
            )));
        }
        if self.staged && self.max_batch_size == 0 {
            return Err(NgpError::InvalidConfig(
                "staged rendering needs a max_batch_size above 0".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(NgpError::InvalidConfig(
                "max_steps has to be at least 1".to_string(),
            ));
        }
        if !(self.dt_gamma >= 0.0) {
            return Err(NgpError::InvalidConfig(format!(
                "dt_gamma can't be negative, got {}",
                self.dt_gamma
            )));
        }
        Ok(())
    }
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
    /// Options of a `Render` statement.
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let mut options = RenderOptions::default();
        options.num_uniform_steps = non_negative(
            params,
            "num_uniform_steps",
            options.num_uniform_steps as i32,
        )? as usize;
        options.num_importance_steps = non_negative(
            params,
            "num_importance_steps",
            options.num_importance_steps as i32,
        )? as usize;
        options.perturb = params.find_one_bool("perturb", options.perturb);
        options.max_steps = non_negative(params, "max_steps", options.max_steps as i32)? as u32;
        options.force_all_rays = params.find_one_bool("force_all_rays", options.force_all_rays);
        options.staged = params.find_one_bool("staged", options.staged);
        options.max_batch_size =
            non_negative(params, "max_batch_size", options.max_batch_size as i32)? as usize;
        options.dt_gamma = params.find_one_float("dt_gamma", options.dt_gamma);
        if params.has_spectrum("bg_color") {
            options.bg_color = Some(params.find_one_spectrum("bg_color", Spectrum::new(1.0)));
        }
        options.mode = match params.find_one_string("mode", String::from("inference")).as_str() {
            "inference" => RenderMode::Inference,
            "training" => RenderMode::Training,
            mode => {
                return Err(NgpError::Parse(format!(
                    "render mode {:?} unknown, use \"training\" or \"inference\"",
                    mode
                )));
            }
        };
        options.cal_dist_loss = params.find_one_bool("cal_dist_loss", options.cal_dist_loss);
        options.validate()?;
        Ok(options)
    }
}

/// View point of a `Camera` or `TrainingView` statement.
pub fn make_pose(params: &ParamSet) -> Result<CameraPose> {
    let eye: Point3f = params.find_one_point3f("eye", Point3f::new(0.0, 0.0, 3.0));
    let look: Point3f = params.find_one_point3f("look", Point3f::default());
    let up: Point3f = params.find_one_point3f("up", Point3f::new(0.0, 1.0, 0.0));
    CameraPose::look_at(&eye, &look, &Vector3f::new(up.x, up.y, up.z))
}

pub fn make_camera(params: &ParamSet) -> Result<PinholeCamera> {
    let xres: i32 = params.find_one_int("xresolution", 64);
    let yres: i32 = params.find_one_int("yresolution", 64);
    if xres <= 0 || yres <= 0 {
        return Err(NgpError::Parse(format!(
            "image resolution {} x {} is empty",
            xres, yres
        )));
    }
    let fov: Float = params.find_one_float("fov", 40.0);
    if !(fov > 0.0 && fov < 180.0) {
        return Err(NgpError::Parse(format!(
            "field of view has to lie in (0, 180) degrees, got {}",
            fov
        )));
    }
    let pose: CameraPose = make_pose(params)?;
    let intrinsics: Intrinsics = Intrinsics::from_fov(fov, xres as u32, yres as u32);
    Ok(PinholeCamera::new(pose, intrinsics, xres as u32, yres as u32))
}

pub fn make_field(params: &ParamSet) -> Result<Box<dyn RadianceField>> {
    match params.name.as_str() {
        "sphere" => Ok(Box::new(HomogeneousSphere::create(params)?)),
        "grid" => Ok(Box::new(GridDensityField::create(params)?)),
        name => Err(NgpError::Parse(format!("field {:?} unknown", name))),
    }
}

pub fn make_background(params: &ParamSet) -> Result<Box<dyn Background>> {
    match params.name.as_str() {
        "constant" => Ok(Box::new(ConstantBackground::create(params))),
        "sky" => Ok(Box::new(SkyBackground::create(params))),
        name => Err(NgpError::Parse(format!("background {:?} unknown", name))),
    }
}

/// Everything a scene file describes.
pub struct SceneDescription {
    pub renderer: RendererOptions,
    pub render: RenderOptions,
    pub camera: PinholeCamera,
    pub field: Box<dyn RadianceField>,
    pub background: Option<Box<dyn Background>>,
    /// poses whose frustums define the trained part of the grid
    pub training_views: Vec<CameraPose>,
}

impl SceneDescription {
    pub fn from_statements(statements: &[ParamSet]) -> Result<Self> {
        let mut renderer: RendererOptions = RendererOptions::default();
        let mut render: RenderOptions = RenderOptions::default();
        let mut camera: Option<PinholeCamera> = None;
        let mut field: Option<Box<dyn RadianceField>> = None;
        let mut background: Option<Box<dyn Background>> = None;
        let mut training_views: Vec<CameraPose> = Vec::new();
        for params in statements {
            match params.key_word.as_str() {
                "Renderer" => renderer = RendererOptions::from_params(params)?,
                "Render" => render = RenderOptions::from_params(params)?,
                "Camera" => camera = Some(make_camera(params)?),
                "Field" => field = Some(make_field(params)?),
                "Background" => background = Some(make_background(params)?),
                "TrainingView" => training_views.push(make_pose(params)?),
                key_word => {
                    return Err(NgpError::Parse(format!("statement {:?} unknown", key_word)));
                }
            }
        }
        let camera: PinholeCamera = match camera {
            Some(camera) => camera,
            None => make_camera(&ParamSet::new("Camera", ""))?,
        };
        let field: Box<dyn RadianceField> = field
            .ok_or_else(|| NgpError::Parse("scene has no Field statement".to_string()))?;
        Ok(SceneDescription {
            renderer,
            render,
            camera,
            field,
            background,
            training_views,
        })
    }
}
