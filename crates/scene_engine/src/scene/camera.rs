//! # Camera Projection
//!
//! Cameras are scene nodes: their position and orientation come from the
//! node's world matrix, and this module keeps the matrices a renderer needs
//! on top of that:
//!
//! - `matrix_world_inverse`: world-to-view, refreshed by every world-matrix pass
//! - `projection_matrix`: view-to-clip, rebuilt only when projection parameters change
//! - `projection_matrix_inverse`: exact inverse of the projection, rebuilt alongside it
//!
//! ## Coordinate System
//! Right-handed Y-up view space with the camera looking down -Z. Clip space
//! follows the OpenGL convention with NDC depth in [-1, 1].
//!
//! ## Failure Model
//! Every setter validates the candidate parameters and computes the new
//! projection before committing anything. A rejected change returns a
//! [`CameraError`] and leaves the camera exactly as it was.

use thiserror::Error;

use crate::foundation::math::{constants, Mat4, Mat4Ext, Point3, Vec3};

/// Errors raised by degenerate projection parameters
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CameraError {
    /// Clip planes must satisfy `near < far` (and `near > 0` for perspective)
    #[error("Invalid clip planes: near={near}, far={far}")]
    InvalidClipPlanes {
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },

    /// Field of view must lie strictly between 0 and 180 degrees
    #[error("Invalid field of view: {0} degrees")]
    InvalidFov(f32),

    /// Aspect ratio must be positive
    #[error("Invalid aspect ratio: {0}")]
    InvalidAspect(f32),

    /// Zoom must be positive
    #[error("Invalid zoom: {0}")]
    InvalidZoom(f32),

    /// Orthographic bounds enclose no area
    #[error("Empty orthographic bounds: width={width}, height={height}")]
    EmptyBounds {
        /// right - left
        width: f32,
        /// top - bottom
        height: f32,
    },

    /// View offset sizes must be positive
    #[error("Invalid view offset: {0}")]
    InvalidViewOffset(String),

    /// Film gauge and focal length must be positive
    #[error("Invalid film parameter {name}: {value}")]
    InvalidFilm {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: f32,
    },

    /// A parameter was NaN or infinite
    #[error("Non-finite camera parameter: {0}")]
    NonFinite(&'static str),

    /// Operation only applies to perspective cameras
    #[error("Operation requires a perspective camera")]
    NotPerspective,

    /// Operation only applies to orthographic cameras
    #[error("Operation requires an orthographic camera")]
    NotOrthographic,

    /// Projection matrix could not be inverted
    #[error("Projection matrix is singular")]
    SingularProjection,
}

/// Perspective frustum parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveParams {
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Width / height of the viewport
    pub aspect: f32,
    /// Near clipping plane distance
    pub near: f32,
    /// Far clipping plane distance
    pub far: f32,
    /// Object distance used by stereo and depth-of-field effects
    pub focus: f32,
    /// Film size in millimeters, applied to the larger axis
    pub film_gauge: f32,
    /// Horizontal film offset in millimeters
    pub film_offset: f32,
}

impl Default for PerspectiveParams {
    fn default() -> Self {
        Self {
            fov: 50.0,
            aspect: 1.0,
            near: 0.1,
            far: 2000.0,
            focus: 10.0,
            film_gauge: 35.0,
            film_offset: 0.0,
        }
    }
}

impl PerspectiveParams {
    fn validate(&self) -> Result<(), CameraError> {
        finite("fov", self.fov)?;
        finite("aspect", self.aspect)?;
        finite("near", self.near)?;
        finite("far", self.far)?;
        finite("film_gauge", self.film_gauge)?;
        finite("film_offset", self.film_offset)?;

        if self.fov <= 0.0 || self.fov >= 180.0 {
            return Err(CameraError::InvalidFov(self.fov));
        }
        if self.aspect <= 0.0 {
            return Err(CameraError::InvalidAspect(self.aspect));
        }
        if self.near <= 0.0 || self.near >= self.far {
            return Err(CameraError::InvalidClipPlanes { near: self.near, far: self.far });
        }
        if self.film_gauge <= 0.0 {
            return Err(CameraError::InvalidFilm { name: "film_gauge", value: self.film_gauge });
        }
        Ok(())
    }

    /// Film width in millimeters
    pub fn film_width(&self) -> f32 {
        self.film_gauge * self.aspect.min(1.0)
    }

    /// Film height in millimeters
    pub fn film_height(&self) -> f32 {
        self.film_gauge / self.aspect.max(1.0)
    }
}

/// Orthographic box parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicParams {
    /// Left plane
    pub left: f32,
    /// Right plane
    pub right: f32,
    /// Top plane
    pub top: f32,
    /// Bottom plane
    pub bottom: f32,
    /// Near plane
    pub near: f32,
    /// Far plane
    pub far: f32,
}

impl Default for OrthographicParams {
    fn default() -> Self {
        Self { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0, near: 0.1, far: 2000.0 }
    }
}

impl OrthographicParams {
    fn validate(&self) -> Result<(), CameraError> {
        finite("left", self.left)?;
        finite("right", self.right)?;
        finite("top", self.top)?;
        finite("bottom", self.bottom)?;
        finite("near", self.near)?;
        finite("far", self.far)?;

        let (width, height) = (self.right - self.left, self.top - self.bottom);
        if width == 0.0 || height == 0.0 {
            return Err(CameraError::EmptyBounds { width, height });
        }
        if self.near >= self.far {
            return Err(CameraError::InvalidClipPlanes { near: self.near, far: self.far });
        }
        Ok(())
    }
}

/// Kind of projection and its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective frustum
    Perspective(PerspectiveParams),
    /// Orthographic box
    Orthographic(OrthographicParams),
}

impl Projection {
    fn validate(&self) -> Result<(), CameraError> {
        match self {
            Self::Perspective(p) => p.validate(),
            Self::Orthographic(o) => o.validate(),
        }
    }

    /// Near plane distance
    pub fn near(&self) -> f32 {
        match self {
            Self::Perspective(p) => p.near,
            Self::Orthographic(o) => o.near,
        }
    }

    /// Far plane distance
    pub fn far(&self) -> f32 {
        match self {
            Self::Perspective(p) => p.far,
            Self::Orthographic(o) => o.far,
        }
    }
}

/// Sub-rectangle of a larger virtual frame rendered by this camera
///
/// Used for tiled and multi-monitor rendering: each tile's camera renders
/// only its part of the full frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewOffset {
    /// Full frame width
    pub full_width: f32,
    /// Full frame height
    pub full_height: f32,
    /// Horizontal offset of the sub-rectangle
    pub offset_x: f32,
    /// Vertical offset of the sub-rectangle
    pub offset_y: f32,
    /// Width of the sub-rectangle
    pub width: f32,
    /// Height of the sub-rectangle
    pub height: f32,
}

impl ViewOffset {
    fn validate(&self) -> Result<(), CameraError> {
        let sizes = [self.full_width, self.full_height, self.width, self.height];
        if sizes.iter().any(|s| !s.is_finite() || *s <= 0.0)
            || !self.offset_x.is_finite()
            || !self.offset_y.is_finite()
        {
            return Err(CameraError::InvalidViewOffset(format!("{self:?}")));
        }
        Ok(())
    }
}

fn finite(name: &'static str, value: f32) -> Result<(), CameraError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CameraError::NonFinite(name))
    }
}

/// Projection state of a camera node
///
/// # Usage
/// ```rust
/// use scene_engine::scene::camera::Camera;
///
/// let mut camera = Camera::perspective(75.0, 16.0 / 9.0, 0.1, 1000.0)?;
/// camera.set_aspect(4.0 / 3.0)?;
/// assert!(camera.set_clip_planes(10.0, 1.0).is_err());
/// # Ok::<(), scene_engine::scene::camera::CameraError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Camera {
    projection: Projection,
    zoom: f32,
    view: Option<ViewOffset>,
    matrix_world_inverse: Mat4,
    projection_matrix: Mat4,
    projection_matrix_inverse: Mat4,
}

impl Camera {
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `fov` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height) of the viewport
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Result<Self, CameraError> {
        Self::new(Projection::Perspective(PerspectiveParams {
            fov,
            aspect,
            near,
            far,
            ..PerspectiveParams::default()
        }))
    }

    /// Create an orthographic camera
    pub fn orthographic(
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) -> Result<Self, CameraError> {
        Self::new(Projection::Orthographic(OrthographicParams { left, right, top, bottom, near, far }))
    }

    /// Create a camera from explicit projection parameters
    pub fn new(projection: Projection) -> Result<Self, CameraError> {
        let (projection_matrix, projection_matrix_inverse) = compute_projection(&projection, 1.0, None)?;
        Ok(Self {
            projection,
            zoom: 1.0,
            view: None,
            matrix_world_inverse: Mat4::identity(),
            projection_matrix,
            projection_matrix_inverse,
        })
    }

    /// Projection kind and parameters
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// True for perspective cameras
    pub fn is_perspective(&self) -> bool {
        matches!(self.projection, Projection::Perspective(_))
    }

    /// Zoom factor
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Active view offset, if any
    pub fn view_offset(&self) -> Option<&ViewOffset> {
        self.view.as_ref()
    }

    /// World-to-view matrix from the last world-matrix pass
    pub fn matrix_world_inverse(&self) -> &Mat4 {
        &self.matrix_world_inverse
    }

    /// View-to-clip matrix
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// Clip-to-view matrix, exact inverse of [`projection_matrix`](Self::projection_matrix)
    pub fn projection_matrix_inverse(&self) -> &Mat4 {
        &self.projection_matrix_inverse
    }

    /// Projection times view; world space to clip space
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.matrix_world_inverse
    }

    /// Refresh the world-to-view matrix after the node's world matrix changed
    pub(crate) fn update_matrix_world_inverse(&mut self, matrix_world: &Mat4) {
        self.matrix_world_inverse = matrix_world.try_inverse().unwrap_or_else(|| {
            log::warn!("Camera world matrix is singular, using identity view matrix");
            Mat4::identity()
        });
    }

    /// Recompute the projection matrices from the current parameters
    pub fn update_projection_matrix(&mut self) -> Result<(), CameraError> {
        self.commit(self.projection, self.zoom, self.view)
    }

    // Validate and compute first so a failure leaves every field untouched
    fn commit(
        &mut self,
        projection: Projection,
        zoom: f32,
        view: Option<ViewOffset>,
    ) -> Result<(), CameraError> {
        let (matrix, inverse) = compute_projection(&projection, zoom, view.as_ref())?;
        self.projection = projection;
        self.zoom = zoom;
        self.view = view;
        self.projection_matrix = matrix;
        self.projection_matrix_inverse = inverse;
        log::trace!("Camera projection updated: {:?}", self.projection);
        Ok(())
    }

    fn perspective_params(&self) -> Result<PerspectiveParams, CameraError> {
        match self.projection {
            Projection::Perspective(p) => Ok(p),
            Projection::Orthographic(_) => Err(CameraError::NotPerspective),
        }
    }

    fn orthographic_params(&self) -> Result<OrthographicParams, CameraError> {
        match self.projection {
            Projection::Orthographic(o) => Ok(o),
            Projection::Perspective(_) => Err(CameraError::NotOrthographic),
        }
    }

    /// Replace the perspective parameters
    pub fn set_perspective(&mut self, params: PerspectiveParams) -> Result<(), CameraError> {
        self.commit(Projection::Perspective(params), self.zoom, self.view)
    }

    /// Replace the orthographic parameters
    pub fn set_orthographic(&mut self, params: OrthographicParams) -> Result<(), CameraError> {
        self.commit(Projection::Orthographic(params), self.zoom, self.view)
    }

    /// Set the vertical field of view in degrees
    pub fn set_fov(&mut self, fov: f32) -> Result<(), CameraError> {
        let params = PerspectiveParams { fov, ..self.perspective_params()? };
        self.set_perspective(params)
    }

    /// Update the aspect ratio, typically after a window resize
    pub fn set_aspect(&mut self, aspect: f32) -> Result<(), CameraError> {
        let current = self.perspective_params()?;
        // Window resizes arrive in bursts; only log meaningful changes
        if (current.aspect - aspect).abs() > 0.01 {
            log::debug!("Camera aspect ratio changed: {:.3} -> {:.3}", current.aspect, aspect);
        }
        self.set_perspective(PerspectiveParams { aspect, ..current })
    }

    /// Set the near and far clip planes
    pub fn set_clip_planes(&mut self, near: f32, far: f32) -> Result<(), CameraError> {
        match self.projection {
            Projection::Perspective(p) => self.set_perspective(PerspectiveParams { near, far, ..p }),
            Projection::Orthographic(o) => self.set_orthographic(OrthographicParams { near, far, ..o }),
        }
    }

    /// Set the orthographic box sides
    pub fn set_bounds(&mut self, left: f32, right: f32, top: f32, bottom: f32) -> Result<(), CameraError> {
        let current = self.orthographic_params()?;
        self.set_orthographic(OrthographicParams { left, right, top, bottom, ..current })
    }

    /// Set the zoom factor
    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), CameraError> {
        finite("zoom", zoom)?;
        if zoom <= 0.0 {
            return Err(CameraError::InvalidZoom(zoom));
        }
        self.commit(self.projection, zoom, self.view)
    }

    /// Set the horizontal film offset in millimeters
    pub fn set_film_offset(&mut self, film_offset: f32) -> Result<(), CameraError> {
        let params = PerspectiveParams { film_offset, ..self.perspective_params()? };
        self.set_perspective(params)
    }

    /// Set the film gauge in millimeters
    pub fn set_film_gauge(&mut self, film_gauge: f32) -> Result<(), CameraError> {
        let params = PerspectiveParams { film_gauge, ..self.perspective_params()? };
        self.set_perspective(params)
    }

    /// Render only a sub-rectangle of a larger virtual frame
    ///
    /// For perspective cameras the aspect ratio becomes that of the full frame.
    ///
    /// # Example
    /// Two side-by-side monitors of 1920x1080 each; the right monitor's camera uses
    /// `set_view_offset(3840.0, 1080.0, 1920.0, 0.0, 1920.0, 1080.0)`.
    pub fn set_view_offset(
        &mut self,
        full_width: f32,
        full_height: f32,
        offset_x: f32,
        offset_y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), CameraError> {
        let view = ViewOffset { full_width, full_height, offset_x, offset_y, width, height };
        view.validate()?;

        let projection = match self.projection {
            Projection::Perspective(p) => Projection::Perspective(PerspectiveParams {
                aspect: full_width / full_height,
                ..p
            }),
            ortho @ Projection::Orthographic(_) => ortho,
        };
        self.commit(projection, self.zoom, Some(view))
    }

    /// Render the full frame again
    pub fn clear_view_offset(&mut self) -> Result<(), CameraError> {
        self.commit(self.projection, self.zoom, None)
    }

    /// Set the field of view from a focal length in millimeters, given the film gauge
    pub fn set_focal_length(&mut self, focal_length: f32) -> Result<(), CameraError> {
        let current = self.perspective_params()?;
        if !(focal_length.is_finite() && focal_length > 0.0) {
            return Err(CameraError::InvalidFilm { name: "focal_length", value: focal_length });
        }
        let v_extent_slope = 0.5 * current.film_height() / focal_length;
        let fov = constants::RAD_TO_DEG * 2.0 * v_extent_slope.atan();
        self.set_perspective(PerspectiveParams { fov, ..current })
    }

    /// Focal length in millimeters for the current field of view and film gauge
    pub fn focal_length(&self) -> Option<f32> {
        self.perspective_params().ok().map(|p| {
            let v_extent_slope = (constants::DEG_TO_RAD * 0.5 * p.fov).tan();
            0.5 * p.film_height() / v_extent_slope
        })
    }

    /// Field of view in degrees after zoom is applied
    pub fn effective_fov(&self) -> Option<f32> {
        self.perspective_params().ok().map(|p| {
            constants::RAD_TO_DEG * 2.0 * ((constants::DEG_TO_RAD * 0.5 * p.fov).tan() / self.zoom).atan()
        })
    }

    /// Film width in millimeters
    pub fn film_width(&self) -> Option<f32> {
        self.perspective_params().ok().map(|p| p.film_width())
    }

    /// Film height in millimeters
    pub fn film_height(&self) -> Option<f32> {
        self.perspective_params().ok().map(|p| p.film_height())
    }

    /// Project a world-space point to normalized device coordinates
    pub fn project(&self, world_point: &Vec3) -> Vec3 {
        self.view_projection().transform_point(&Point3::from(*world_point)).coords
    }

    /// Map normalized device coordinates back to world space
    pub fn unproject(&self, ndc: &Vec3) -> Vec3 {
        let matrix_world = self.matrix_world_inverse.try_inverse().unwrap_or_else(Mat4::identity);
        let view_point = self.projection_matrix_inverse.transform_point(&Point3::from(*ndc));
        matrix_world.transform_point(&view_point).coords
    }
}

fn compute_projection(
    projection: &Projection,
    zoom: f32,
    view: Option<&ViewOffset>,
) -> Result<(Mat4, Mat4), CameraError> {
    projection.validate()?;
    finite("zoom", zoom)?;
    if zoom <= 0.0 {
        return Err(CameraError::InvalidZoom(zoom));
    }
    if let Some(view) = view {
        view.validate()?;
    }

    let matrix = match projection {
        Projection::Perspective(p) => perspective_matrix(p, zoom, view),
        Projection::Orthographic(o) => orthographic_matrix(o, zoom, view),
    };
    let inverse = matrix.try_inverse().ok_or(CameraError::SingularProjection)?;
    Ok((matrix, inverse))
}

fn perspective_matrix(p: &PerspectiveParams, zoom: f32, view: Option<&ViewOffset>) -> Mat4 {
    let near = p.near;
    let mut top = near * (constants::DEG_TO_RAD * 0.5 * p.fov).tan() / zoom;
    let mut height = 2.0 * top;
    let mut width = p.aspect * height;
    let mut left = -0.5 * width;

    if let Some(view) = view {
        left += view.offset_x * width / view.full_width;
        top -= view.offset_y * height / view.full_height;
        width *= view.width / view.full_width;
        height *= view.height / view.full_height;
    }

    if p.film_offset != 0.0 {
        left += near * p.film_offset / p.film_width();
    }

    Mat4::make_perspective(left, left + width, top, top - height, near, p.far)
}

fn orthographic_matrix(o: &OrthographicParams, zoom: f32, view: Option<&ViewOffset>) -> Mat4 {
    let dx = (o.right - o.left) / (2.0 * zoom);
    let dy = (o.top - o.bottom) / (2.0 * zoom);
    let cx = (o.right + o.left) / 2.0;
    let cy = (o.top + o.bottom) / 2.0;

    let mut left = cx - dx;
    let mut right = cx + dx;
    let mut top = cy + dy;
    let mut bottom = cy - dy;

    if let Some(view) = view {
        let scale_w = (o.right - o.left) / view.full_width / zoom;
        let scale_h = (o.top - o.bottom) / view.full_height / zoom;

        left += scale_w * view.offset_x;
        right = left + scale_w * view.width;
        top -= scale_h * view.offset_y;
        bottom = top - scale_h * view.height;
    }

    Mat4::make_orthographic(left, right, top, bottom, o.near, o.far)
}
