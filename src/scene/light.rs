//! Light types consumed by the light pass

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Brightness below which a light no longer contributes (1/256 of peak)
const CUTOFF: f32 = 256.0;

/// Distance falloff: `1 / (constant + linear * d + quadratic * d^2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.0,
            quadratic: 1.0,
        }
    }
}

impl Attenuation {
    /// Distance at which a light of this intensity and colour falls below
    /// 1/256 of its peak brightness.
    pub fn range(&self, intensity: f32, color: Vec3) -> f32 {
        let i = intensity * color.max_element();
        let (c, l, q) = (self.constant, self.linear, self.quadratic);

        let range = if q.abs() <= f32::EPSILON {
            if l.abs() <= f32::EPSILON {
                return f32::INFINITY;
            }
            (CUTOFF * i - c) / l
        } else {
            (-l + (l * l - 4.0 * q * (c - CUTOFF * i)).sqrt()) / (2.0 * q)
        };

        if range.is_nan() {
            0.0
        } else {
            range.max(0.0)
        }
    }
}

/// Light with parallel rays, like the sun
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.5).normalize(),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    /// A zero `direction` yields a light the light pass skips.
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            color,
            intensity,
        }
    }

    /// Whether `direction` can be normalized.
    pub fn has_direction(&self) -> bool {
        has_direction(self.direction)
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> GpuLightData {
        GpuLightData {
            position_range: Vec4::new(0.0, 0.0, 0.0, f32::MAX),
            color_intensity: self.color.extend(self.intensity),
            direction_kind: self.direction.extend(LightKind::Directional as u32 as f32),
            attenuation_cone: Vec4::ZERO,
        }
    }
}

/// Omnidirectional light with distance falloff
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub attenuation: Attenuation,
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            attenuation: Attenuation::default(),
            range: 16.0,
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            ..Default::default()
        }
        .with_computed_range()
    }

    /// Replace `range` with the cutoff distance of the current attenuation.
    pub fn with_computed_range(mut self) -> Self {
        self.range = self.attenuation.range(self.intensity, self.color);
        self
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> GpuLightData {
        GpuLightData {
            position_range: self.position.extend(self.range),
            color_intensity: self.color.extend(self.intensity),
            direction_kind: Vec4::new(0.0, 0.0, 0.0, LightKind::Point as u32 as f32),
            attenuation_cone: Vec4::new(
                self.attenuation.constant,
                self.attenuation.linear,
                self.attenuation.quadratic,
                -1.0,
            ),
        }
    }
}

/// Point light restricted to a cone
#[derive(Debug, Clone, PartialEq)]
pub struct SpotLight {
    pub point: PointLight,
    pub direction: Vec3,
    /// Half-angle of the cone in radians
    pub cone_angle: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            point: PointLight::default(),
            direction: -Vec3::Y,
            cone_angle: std::f32::consts::FRAC_PI_4,
        }
    }
}

impl SpotLight {
    pub fn new(point: PointLight, direction: Vec3, cone_angle: f32) -> Self {
        Self {
            point,
            direction: direction.normalize_or_zero(),
            cone_angle,
        }
    }

    pub fn has_direction(&self) -> bool {
        has_direction(self.direction)
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> GpuLightData {
        let mut data = self.point.to_gpu_data();
        data.direction_kind = self.direction.extend(LightKind::Spot as u32 as f32);
        data.attenuation_cone.w = self.cone_angle.cos();
        data
    }
}

fn has_direction(direction: Vec3) -> bool {
    direction.is_finite() && direction.length_squared() > f32::EPSILON
}

/// Discriminant stored in [`GpuLightData::direction_kind`]`.w`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

/// GPU-friendly light data structure
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLightData {
    /// xyz = position, w = range
    pub position_range: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    /// xyz = direction, w = light kind
    pub direction_kind: Vec4,
    /// xyz = constant/linear/quadratic, w = cos(cone angle)
    pub attenuation_cone: Vec4,
}
