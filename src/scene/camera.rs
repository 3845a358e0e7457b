//! Camera math
//!
//! A [`Camera`] is plain data: a transform plus projection parameters.
//! Matrices and basis vectors are derived on demand by the free functions
//! in this module, so nothing cached can drift from the transform.

use crate::error::{RenderError, RenderResult};
use crate::scene::Transform;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3, Vec4};

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ProjectionKind {
    #[default]
    Perspective = 0,
    InfinitePerspective = 1,
    Orthographic = 2,
}

impl TryFrom<u32> for ProjectionKind {
    type Error = RenderError;

    fn try_from(value: u32) -> RenderResult<Self> {
        match value {
            0 => Ok(ProjectionKind::Perspective),
            1 => Ok(ProjectionKind::InfinitePerspective),
            2 => Ok(ProjectionKind::Orthographic),
            other => Err(RenderError::UnsupportedProjection(other)),
        }
    }
}

/// Camera for viewing the scene
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub transform: Transform,
    pub projection: ProjectionKind,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Half-height of the orthographic view volume
    pub ortho_scale: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            projection: ProjectionKind::Perspective,
            fov: 50f32.to_radians(),
            ortho_scale: 1.0,
            near: 0.1,
            far: 256.0,
            aspect: 4.0 / 3.0,
        }
    }
}

impl Camera {
    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov: fov_degrees.to_radians(),
            aspect,
            near,
            far,
            ..Default::default()
        }
    }

    pub fn orthographic(ortho_scale: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: ProjectionKind::Orthographic,
            ortho_scale,
            aspect,
            near,
            far,
            ..Default::default()
        }
    }

    /// Update aspect ratio from framebuffer dimensions
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    /// Build camera uniform data for shaders
    pub fn uniform(&self) -> CameraUniform {
        let view = view(self);
        let proj = projection(self);
        let view_proj = proj * view;

        CameraUniform {
            view,
            proj,
            view_proj,
            inv_view_proj: view_proj.inverse(),
            position: self.transform.position.extend(1.0),
        }
    }
}

/// World to camera space
pub fn view(camera: &Camera) -> Mat4 {
    let t = &camera.transform;
    Mat4::from_scale(t.scale.recip())
        * Mat4::from_quat(t.orientation.conjugate())
        * Mat4::from_translation(-t.position)
}

/// Camera to clip space
pub fn projection(camera: &Camera) -> Mat4 {
    match camera.projection {
        ProjectionKind::Perspective => {
            Mat4::perspective_rh(camera.fov, camera.aspect, camera.near, camera.far)
        }
        ProjectionKind::InfinitePerspective => {
            Mat4::perspective_infinite_rh(camera.fov, camera.aspect, camera.near)
        }
        ProjectionKind::Orthographic => {
            let distance = 0.5 * (camera.far - camera.near);
            let s = camera.ortho_scale;
            let a = camera.aspect;
            Mat4::orthographic_rh(-s * a, s * a, -s, s, -distance, distance)
        }
    }
}

/// `projection * view`
pub fn matrix(camera: &Camera) -> Mat4 {
    projection(camera) * view(camera)
}

/// Point the camera's forward axis at `target`.
///
/// Leaves the orientation untouched when the direction is degenerate
/// (target at the camera position, or parallel to `up`).
pub fn look_at(camera: &mut Camera, target: Vec3, up: Vec3) {
    let direction = target - camera.transform.position;
    if direction.length_squared() <= f32::EPSILON || direction.cross(up).length_squared() <= f32::EPSILON {
        log::debug!("look_at: degenerate direction {:?} with up {:?}", direction, up);
        return;
    }
    let look = Mat4::look_at_rh(camera.transform.position, target, up);
    camera.transform.orientation = Quat::from_mat4(&look).conjugate().normalize();
}

/// Yaw about world up, then pitch about the current right axis.
/// Deltas compound across calls.
pub fn offset_orientation(orientation: &mut Quat, yaw: f32, pitch: f32) {
    let yaw_rot = Quat::from_axis_angle(Vec3::Y, yaw);
    let pitch_rot = Quat::from_axis_angle(right(*orientation), pitch);
    *orientation = (yaw_rot * pitch_rot * *orientation).normalize();
}

pub fn forward(orientation: Quat) -> Vec3 {
    orientation * Vec3::NEG_Z
}

pub fn backward(orientation: Quat) -> Vec3 {
    orientation * Vec3::Z
}

pub fn right(orientation: Quat) -> Vec3 {
    orientation * Vec3::X
}

pub fn left(orientation: Quat) -> Vec3 {
    orientation * Vec3::NEG_X
}

pub fn up(orientation: Quat) -> Vec3 {
    orientation * Vec3::Y
}

pub fn down(orientation: Quat) -> Vec3 {
    orientation * Vec3::NEG_Y
}

/// Camera uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    pub position: Vec4,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn identity_view() {
        let camera = Camera::default();
        assert!(view(&camera).abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn view_inverts_transform() {
        let mut camera = Camera::default();
        camera.transform = Transform::from_position_orientation(
            Vec3::new(3.0, -1.0, 2.0),
            Quat::from_rotation_y(0.7),
        )
        .with_scale(Vec3::splat(2.0));

        let round_trip = view(&camera) * camera.transform.matrix();
        assert!(round_trip.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn orthographic_extents() {
        let s = 3.0;
        let camera = Camera::orthographic(s, 1.0, 0.1, 100.0);
        let proj = projection(&camera);

        let top_right = proj.project_point3(Vec3::new(s, s, 0.0));
        let bottom_left = proj.project_point3(Vec3::new(-s, -s, 0.0));
        assert!(top_right.truncate().abs_diff_eq(glam::Vec2::ONE, 1e-6));
        assert!(bottom_left.truncate().abs_diff_eq(-glam::Vec2::ONE, 1e-6));
    }

    #[test]
    fn orthographic_scales_width_by_aspect() {
        let camera = Camera::orthographic(1.0, 2.0, 0.1, 100.0);
        let p = projection(&camera).project_point3(Vec3::new(2.0, 1.0, 0.0));
        assert!(p.truncate().abs_diff_eq(glam::Vec2::ONE, 1e-6));
    }

    #[test]
    fn infinite_perspective_ignores_far() {
        let mut a = Camera::default();
        a.projection = ProjectionKind::InfinitePerspective;
        let mut b = a.clone();
        b.far = 10.0;
        assert_eq!(projection(&a), projection(&b));
    }

    #[test]
    fn matrix_is_projection_times_view() {
        let mut camera = Camera::default();
        camera.transform.position = Vec3::new(0.0, 1.0, 5.0);
        assert_eq!(matrix(&camera), projection(&camera) * view(&camera));
    }

    #[test]
    fn projection_kind_from_u32() {
        assert_eq!(ProjectionKind::try_from(2).unwrap(), ProjectionKind::Orthographic);
        assert!(matches!(
            ProjectionKind::try_from(7),
            Err(RenderError::UnsupportedProjection(7))
        ));
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let mut camera = Camera::default();
        camera.transform.position = Vec3::new(4.0, 2.0, 4.0);
        let target = Vec3::new(0.0, 1.0, -1.0);

        look_at(&mut camera, target, Vec3::Y);

        let expected = (target - camera.transform.position).normalize();
        assert!(forward(camera.transform.orientation).abs_diff_eq(expected, 1e-5));
        let eye = view(&camera).transform_point3(target);
        assert!(eye.x.abs() < 1e-4 && eye.y.abs() < 1e-4 && eye.z < 0.0);
    }

    #[test]
    fn look_at_degenerate_keeps_orientation() {
        let mut camera = Camera::default();
        look_at(&mut camera, Vec3::ZERO, Vec3::Y);
        assert_eq!(camera.transform.orientation, Quat::IDENTITY);
    }

    #[test]
    fn offset_orientation_compounds() {
        let mut twice = Quat::IDENTITY;
        offset_orientation(&mut twice, FRAC_PI_2, 0.0);
        offset_orientation(&mut twice, FRAC_PI_2, 0.0);

        let mut once = Quat::IDENTITY;
        offset_orientation(&mut once, PI, 0.0);

        assert!(forward(twice).abs_diff_eq(forward(once), 1e-5));
        assert!(right(twice).abs_diff_eq(right(once), 1e-5));
        assert!(forward(once).abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn pitch_uses_current_right_axis() {
        let mut q = Quat::IDENTITY;
        offset_orientation(&mut q, FRAC_PI_2, 0.0);
        offset_orientation(&mut q, 0.0, FRAC_PI_2);
        // Looking along -X after the yaw, pitching up tilts forward to +Y
        assert!(forward(q).abs_diff_eq(Vec3::Y, 1e-5));
        assert!(right(q).abs_diff_eq(Vec3::NEG_Z, 1e-5));
    }

    #[test]
    fn basis_vectors_are_opposed() {
        let q = Quat::from_euler(glam::EulerRot::YXZ, 0.3, -0.2, 0.1);
        assert!((forward(q) + backward(q)).length() < 1e-6);
        assert!((right(q) + left(q)).length() < 1e-6);
        assert!((up(q) + down(q)).length() < 1e-6);
        assert!(forward(q).dot(up(q)).abs() < 1e-6);
    }

    #[test]
    fn uniform_inverse() {
        let mut camera = Camera::default();
        camera.transform.position = Vec3::new(1.0, 2.0, 3.0);
        let uniform = camera.uniform();
        assert!((uniform.inv_view_proj * uniform.view_proj).abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert_eq!(uniform.position, Vec4::new(1.0, 2.0, 3.0, 1.0));
    }
}
