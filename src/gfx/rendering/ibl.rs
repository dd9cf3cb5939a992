//! Image-based lighting maps
//!
//! An equirectangular HDR environment is baked on the CPU into the three
//! textures the PBR shader samples:
//!
//! - `irradianceMap`: cosine-convolved cube map for diffuse ambient light
//! - `prefilterMap`: GGX-prefiltered cube map, one roughness step per mip
//! - `brdfLUT`: split-sum scale/bias indexed by (N·V, roughness)
//!
//! The maps are small and baked once at startup, then uploaded as
//! `Rgb9e5Ufloat` textures.

use std::f32::consts::PI;
use std::path::Path;

use cgmath::{InnerSpace, Vector3};

use crate::error::AssetError;
use crate::gfx::resources::texture_resource::TextureResource;
use crate::gfx::resources::texture_store::{TextureId, TextureStore};
use crate::gfx::shader::SamplerKind;

/// Edge length of prefilter mip 0
pub const PREFILTER_SIZE: u32 = 64;
/// Mip count of the prefilter map; the last one is fully rough
pub const PREFILTER_LEVELS: u32 = 5;
pub const IRRADIANCE_SIZE: u32 = 8;
pub const BRDF_LUT_SIZE: u32 = 32;

const PREFILTER_SAMPLES: u32 = 64;
const BRDF_SAMPLES: u32 = 128;
/// Working resolution the environment is box-filtered down to before convolution
const WORKING_WIDTH: u32 = 128;

/// Packs linear RGB into the shared-exponent `Rgb9e5Ufloat` texel layout
///
/// Negative and NaN components become 0; values above the format maximum
/// (65408) saturate.
pub fn pack_rgb9e5(rgb: [f32; 3]) -> u32 {
    const MANTISSA_BITS: i32 = 9;
    const BIAS: i32 = 15;
    const MAX_VALUE: f32 = 65408.0;

    let clamp = |c: f32| if c.is_nan() { 0.0 } else { c.clamp(0.0, MAX_VALUE) };
    let [r, g, b] = rgb.map(clamp);
    let max = r.max(g).max(b);

    let mut exponent = (max.log2().floor() as i32).max(-BIAS - 1) + 1 + BIAS;
    let mut scale = 2f32.powi(exponent - BIAS - MANTISSA_BITS);
    if (max / scale + 0.5).floor() as i32 == 1 << MANTISSA_BITS {
        exponent += 1;
        scale *= 2.0;
    }

    let quantize = |c: f32| ((c / scale + 0.5).floor() as u32).min(511);
    quantize(r) | quantize(g) << 9 | quantize(b) << 18 | (exponent as u32) << 27
}

/// Inverse of [`pack_rgb9e5`]
pub fn unpack_rgb9e5(texel: u32) -> [f32; 3] {
    let exponent = (texel >> 27) as i32;
    let scale = 2f32.powi(exponent - 15 - 9);
    [
        (texel & 0x1ff) as f32 * scale,
        ((texel >> 9) & 0x1ff) as f32 * scale,
        ((texel >> 18) & 0x1ff) as f32 * scale,
    ]
}

/// Equirectangular radiance image; row 0 is the +Y pole
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    width: u32,
    height: u32,
    texels: Vec<[f32; 3]>,
}

impl Environment {
    /// Loads a Radiance `.hdr` (or any image the `image` crate decodes)
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let decoded = image::open(path).map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let rgb = decoded.into_rgb32f();
        let (width, height) = rgb.dimensions();
        let texels = rgb.pixels().map(|p| p.0).collect();
        log::info!("Loaded environment '{}' ({}x{})", path.display(), width, height);

        Ok(Self { width, height, texels })
    }

    /// The same radiance from every direction
    pub fn uniform(rgb: [f32; 3]) -> Self {
        Self {
            width: 1,
            height: 1,
            texels: vec![rgb],
        }
    }

    pub fn from_texels(width: u32, height: u32, texels: Vec<[f32; 3]>) -> Option<Self> {
        (width > 0 && height > 0 && texels.len() == (width * height) as usize).then_some(Self {
            width,
            height,
            texels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nearest texel in `direction` (need not be normalised)
    pub fn sample(&self, direction: Vector3<f32>) -> [f32; 3] {
        let d = direction.normalize();
        let u = d.z.atan2(d.x) / (2.0 * PI) + 0.5;
        let v = d.y.clamp(-1.0, 1.0).asin() / PI + 0.5;

        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = (((1.0 - v) * self.height as f32) as u32).min(self.height - 1);
        self.texels[(y * self.width + x) as usize]
    }

    /// Box-filters down so the width is at most `max_width`
    fn downsampled(&self, max_width: u32) -> Self {
        let factor = self.width.div_ceil(max_width).max(1);
        if factor == 1 {
            return self.clone();
        }

        let width = (self.width / factor).max(1);
        let height = (self.height / factor).max(1);
        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let mut sum = [0.0f32; 3];
                let mut count = 0.0;
                for sy in y * factor..((y + 1) * factor).min(self.height) {
                    for sx in x * factor..((x + 1) * factor).min(self.width) {
                        let t = self.texels[(sy * self.width + sx) as usize];
                        sum = [sum[0] + t[0], sum[1] + t[1], sum[2] + t[2]];
                        count += 1.0;
                    }
                }
                texels.push(sum.map(|c| c / count));
            }
        }

        Self { width, height, texels }
    }
}

/// Direction through texel (`x`, `y`) of cube `face` (+X, -X, +Y, -Y, +Z, -Z)
pub fn cube_direction(face: usize, x: u32, y: u32, size: u32) -> Vector3<f32> {
    let s = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
    let t = 2.0 * (y as f32 + 0.5) / size as f32 - 1.0;
    let d = match face {
        0 => Vector3::new(1.0, -t, -s),
        1 => Vector3::new(-1.0, -t, s),
        2 => Vector3::new(s, 1.0, t),
        3 => Vector3::new(s, -1.0, -t),
        4 => Vector3::new(s, -t, 1.0),
        _ => Vector3::new(-s, -t, -1.0),
    };
    d.normalize()
}

fn render_cube(size: u32, mut f: impl FnMut(Vector3<f32>) -> [f32; 3]) -> Vec<[f32; 3]> {
    let mut texels = Vec::with_capacity((size * size * 6) as usize);
    for face in 0..6 {
        for y in 0..size {
            for x in 0..size {
                texels.push(f(cube_direction(face, x, y, size)));
            }
        }
    }
    texels
}

fn hammersley(i: u32, count: u32) -> (f32, f32) {
    (i as f32 / count as f32, i.reverse_bits() as f32 * 2.328_306_4e-10)
}

/// GGX-distributed half vector around `n`
fn importance_sample_ggx(xi: (f32, f32), n: Vector3<f32>, roughness: f32) -> Vector3<f32> {
    let a = roughness * roughness;
    let phi = 2.0 * PI * xi.0;
    let cos_theta = ((1.0 - xi.1) / (1.0 + (a * a - 1.0) * xi.1)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let h = Vector3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);

    let up = if n.z.abs() < 0.999 {
        Vector3::unit_z()
    } else {
        Vector3::unit_x()
    };
    let tangent = up.cross(n).normalize();
    let bitangent = n.cross(tangent);
    (tangent * h.x + bitangent * h.y + n * h.z).normalize()
}

fn geometry_schlick_ggx(n_dot_x: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    n_dot_x / (n_dot_x * (1.0 - k) + k)
}

/// Cosine-weighted irradiance over the hemisphere around each texel normal
fn bake_irradiance(environment: &Environment) -> Vec<[f32; 3]> {
    let (w, h) = (environment.width, environment.height);
    let texel_area = (2.0 * PI / w as f32) * (PI / h as f32);

    // (direction, radiance * solid angle) per environment texel
    let weighted: Vec<(Vector3<f32>, [f32; 3])> = (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .map(|(x, y)| {
            let latitude = PI * (0.5 - (y as f32 + 0.5) / h as f32);
            let longitude = 2.0 * PI * ((x as f32 + 0.5) / w as f32 - 0.5);
            let direction = Vector3::new(
                latitude.cos() * longitude.cos(),
                latitude.sin(),
                latitude.cos() * longitude.sin(),
            );
            let solid_angle = texel_area * latitude.cos();
            let radiance = environment.texels[(y * w + x) as usize];
            (direction, radiance.map(|c| c * solid_angle))
        })
        .collect();

    render_cube(IRRADIANCE_SIZE, |normal| {
        let mut sum = [0.0f32; 3];
        for (direction, radiance) in &weighted {
            let cos = normal.dot(*direction);
            if cos > 0.0 {
                for c in 0..3 {
                    sum[c] += radiance[c] * cos;
                }
            }
        }
        sum.map(|c| c / PI)
    })
}

fn bake_prefilter_level(environment: &Environment, size: u32, roughness: f32) -> Vec<[f32; 3]> {
    if roughness <= 0.0 {
        return render_cube(size, |direction| environment.sample(direction));
    }

    render_cube(size, |n| {
        let mut sum = [0.0f32; 3];
        let mut weight = 0.0;
        for i in 0..PREFILTER_SAMPLES {
            let h = importance_sample_ggx(hammersley(i, PREFILTER_SAMPLES), n, roughness);
            let l = (h * (2.0 * n.dot(h)) - n).normalize();
            let n_dot_l = n.dot(l);
            if n_dot_l > 0.0 {
                let radiance = environment.sample(l);
                for c in 0..3 {
                    sum[c] += radiance[c] * n_dot_l;
                }
                weight += n_dot_l;
            }
        }
        if weight > 0.0 {
            sum.map(|c| c / weight)
        } else {
            environment.sample(n)
        }
    })
}

/// Split-sum scale (A) and bias (B) of the specular BRDF
pub fn integrate_brdf(n_dot_v: f32, roughness: f32) -> (f32, f32) {
    let n_dot_v = n_dot_v.max(1e-4);
    let v = Vector3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let n = Vector3::unit_z();

    let (mut a, mut b) = (0.0, 0.0);
    for i in 0..BRDF_SAMPLES {
        let h = importance_sample_ggx(hammersley(i, BRDF_SAMPLES), n, roughness);
        let l = (h * (2.0 * v.dot(h)) - v).normalize();
        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);

        if n_dot_l > 0.0 && n_dot_h > 0.0 {
            let g = geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v);
            let fc = (1.0 - v_dot_h).powi(5);
            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }
    (a / BRDF_SAMPLES as f32, b / BRDF_SAMPLES as f32)
}

/// CPU result of the IBL bake, ready for upload
#[derive(Debug, Clone)]
pub struct IblData {
    /// 6 faces of `IRRADIANCE_SIZE²`
    pub irradiance: Vec<[f32; 3]>,
    /// One entry per mip, each 6 faces of `(PREFILTER_SIZE >> mip)²`
    pub prefilter: Vec<Vec<[f32; 3]>>,
    /// `BRDF_LUT_SIZE²`, x = N·V, y = roughness
    pub brdf_lut: Vec<[f32; 3]>,
}

impl IblData {
    pub fn bake(environment: &Environment) -> Self {
        let working = environment.downsampled(WORKING_WIDTH);

        let irradiance = bake_irradiance(&working);
        let prefilter = (0..PREFILTER_LEVELS)
            .map(|mip| {
                let roughness = mip as f32 / (PREFILTER_LEVELS - 1) as f32;
                let source = if mip == 0 { environment } else { &working };
                bake_prefilter_level(source, PREFILTER_SIZE >> mip, roughness)
            })
            .collect();

        let mut brdf_lut = Vec::with_capacity((BRDF_LUT_SIZE * BRDF_LUT_SIZE) as usize);
        for y in 0..BRDF_LUT_SIZE {
            let roughness = (y as f32 + 0.5) / BRDF_LUT_SIZE as f32;
            for x in 0..BRDF_LUT_SIZE {
                let n_dot_v = (x as f32 + 0.5) / BRDF_LUT_SIZE as f32;
                let (a, b) = integrate_brdf(n_dot_v, roughness);
                brdf_lut.push([a, b, 0.0]);
            }
        }

        Self {
            irradiance,
            prefilter,
            brdf_lut,
        }
    }
}

fn pack_texels(texels: &[[f32; 3]]) -> Vec<u32> {
    texels.iter().map(|&t| pack_rgb9e5(t)).collect()
}

/// Uploaded IBL textures, registered in the scene's texture store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IblMaps {
    pub irradiance: TextureId,
    pub prefilter: TextureId,
    pub brdf_lut: TextureId,
}

impl IblMaps {
    /// Texture units the PBR pass binds the maps to
    pub const IRRADIANCE_UNIT: u32 = 10;
    pub const PREFILTER_UNIT: u32 = 11;
    pub const BRDF_LUT_UNIT: u32 = 12;

    /// Bakes `environment` and uploads the result
    ///
    /// Returns `None` when the store has no GPU attached.
    pub fn create(environment: &Environment, textures: &mut TextureStore) -> Option<Self> {
        let context = textures.context()?.clone();
        let data = IblData::bake(environment);

        let irradiance = TextureResource::create_hdr_texture(
            &context.device,
            &context.queue,
            "Irradiance Map",
            IRRADIANCE_SIZE,
            6,
            &[pack_texels(&data.irradiance)],
        );
        let prefilter_levels: Vec<Vec<u32>> = data.prefilter.iter().map(|level| pack_texels(level)).collect();
        let prefilter = TextureResource::create_hdr_texture(
            &context.device,
            &context.queue,
            "Prefilter Map",
            PREFILTER_SIZE,
            6,
            &prefilter_levels,
        );
        let brdf_lut = TextureResource::create_hdr_texture(
            &context.device,
            &context.queue,
            "BRDF LUT",
            BRDF_LUT_SIZE,
            1,
            &[pack_texels(&data.brdf_lut)],
        );
        log::info!("IBL maps baked and uploaded");

        Some(Self {
            irradiance: textures.insert_resource("Irradiance Map", SamplerKind::Cube, irradiance),
            prefilter: textures.insert_resource("Prefilter Map", SamplerKind::Cube, prefilter),
            brdf_lut: textures.insert_resource("BRDF LUT", SamplerKind::Color2d, brdf_lut),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb9e5_exact_values() {
        assert_eq!(pack_rgb9e5([0.0, 0.0, 0.0]), 0);
        assert_eq!(unpack_rgb9e5(pack_rgb9e5([1.0, 0.5, 0.25])), [1.0, 0.5, 0.25]);
        assert_eq!(unpack_rgb9e5(pack_rgb9e5([-3.0, f32::NAN, 2.0])), [0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_rgb9e5_precision_and_saturation() {
        for value in [0.001f32, 0.37, 3.3, 1234.5] {
            let [r, _, _] = unpack_rgb9e5(pack_rgb9e5([value, 0.0, 0.0]));
            assert!((r - value).abs() <= value / 256.0, "{} -> {}", value, r);
        }
        let [r, _, _] = unpack_rgb9e5(pack_rgb9e5([1.0e9, 0.0, 0.0]));
        assert_eq!(r, 65408.0);
    }

    #[test]
    fn test_cube_face_centers() {
        let expected = [
            Vector3::unit_x(),
            -Vector3::unit_x(),
            Vector3::unit_y(),
            -Vector3::unit_y(),
            Vector3::unit_z(),
            -Vector3::unit_z(),
        ];
        for (face, axis) in expected.iter().enumerate() {
            // centre of a 2x2 face sits between texels, use 1x1
            let d = cube_direction(face, 0, 0, 1);
            assert!((d - *axis).magnitude() < 1e-6, "face {}", face);
        }
    }

    #[test]
    fn test_equirect_poles_and_horizon() {
        let mut texels = vec![[0.0; 3]; 4 * 2];
        texels[0] = [1.0, 0.0, 0.0]; // top row
        texels[4] = [0.0, 1.0, 0.0]; // bottom row
        let environment = Environment::from_texels(4, 2, texels).unwrap();

        assert_eq!(environment.sample(Vector3::new(-1.0, 0.9, -0.01)), [1.0, 0.0, 0.0]);
        assert_eq!(environment.sample(Vector3::new(-1.0, -0.9, -0.01)), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_uniform_environment_bakes_to_itself() {
        let environment = Environment::from_texels(64, 32, vec![[0.5, 0.25, 1.0]; 64 * 32]).unwrap();
        let data = IblData::bake(&environment);

        assert_eq!(data.irradiance.len(), (IRRADIANCE_SIZE * IRRADIANCE_SIZE * 6) as usize);
        for texel in &data.irradiance {
            assert!((texel[0] - 0.5).abs() < 0.05, "{:?}", texel);
            assert!((texel[2] - 1.0).abs() < 0.1, "{:?}", texel);
        }
        assert_eq!(data.prefilter.len(), PREFILTER_LEVELS as usize);
        for (mip, level) in data.prefilter.iter().enumerate() {
            let edge = PREFILTER_SIZE >> mip;
            assert_eq!(level.len(), (edge * edge * 6) as usize);
            assert!(level.iter().all(|t| (t[1] - 0.25).abs() < 1e-4));
        }
    }

    #[test]
    fn test_brdf_lut_range() {
        let (a, b) = integrate_brdf(1.0, 0.05);
        assert!(a + b > 0.9 && a + b <= 1.05, "{} {}", a, b);

        for (n_dot_v, roughness) in [(0.1, 0.1), (0.5, 0.5), (0.9, 0.9), (0.2, 1.0)] {
            let (a, b) = integrate_brdf(n_dot_v, roughness);
            assert!((0.0..=1.1).contains(&(a + b)), "{} {}", a, b);
            assert!(a >= 0.0 && b >= 0.0);
        }
    }

    #[test]
    fn test_large_environment_is_downsampled() {
        let environment = Environment::from_texels(512, 256, vec![[1.0; 3]; 512 * 256]).unwrap();
        let working = environment.downsampled(WORKING_WIDTH);
        assert_eq!(working.width(), 128);
        assert_eq!(working.height(), 64);
        assert!(working.texels.iter().all(|t| *t == [1.0, 1.0, 1.0]));
    }
}
