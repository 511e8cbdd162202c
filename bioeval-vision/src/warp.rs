use anyhow::Result;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

/// 2x3 affine transform mapping input coordinates to output coordinates.
///
/// ```text
/// [ a  b  tx ]
/// [ c  d  ty ]
/// ```
/// Where output = [a,b; c,d] * input + [tx, ty]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub c: f32,
    pub d: f32,
    pub ty: f32,
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            tx: 0.0,
            c: 0.0,
            d: 1.0,
            ty: 0.0,
        }
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Map an input point to output space.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.b * y + self.tx,
            self.c * x + self.d * y + self.ty,
        )
    }
}

/// Rotation by `angle_deg` (counter-clockwise, image y axis pointing down)
/// about `center`, combined with isotropic `scale`.
pub fn rotation_matrix(center: (f32, f32), angle_deg: f32, scale: f32) -> Affine {
    let theta = angle_deg.to_radians();
    let alpha = scale * theta.cos();
    let beta = scale * theta.sin();
    let (cx, cy) = center;

    Affine {
        a: alpha,
        b: beta,
        tx: (1.0 - alpha) * cx - beta * cy,
        c: -beta,
        d: alpha,
        ty: beta * cx + (1.0 - alpha) * cy,
    }
}

/// Warp `img` through `transform` into an output of the same size.
///
/// Each output pixel is inverse-mapped into the source and sampled
/// bilinearly; pixels that fall outside the source stay black.
pub fn warp_affine(img: &DynamicImage, transform: &Affine) -> Result<RgbImage> {
    let det = transform.determinant();
    if det.abs() < f32::EPSILON {
        anyhow::bail!("affine transform is not invertible (det = {})", det);
    }

    let (img_w, img_h) = img.dimensions();
    let src = img.to_rgb8();
    let mut output = RgbImage::new(img_w, img_h);
    if img_w == 0 || img_h == 0 {
        return Ok(output);
    }

    let Affine { a, b, tx, c, d, ty } = *transform;

    for out_y in 0..img_h {
        for out_x in 0..img_w {
            let tmp_x = out_x as f32 - tx;
            let tmp_y = out_y as f32 - ty;

            let in_x = (d * tmp_x - b * tmp_y) / det;
            let in_y = (-c * tmp_x + a * tmp_y) / det;

            if in_x < 0.0 || in_x >= img_w as f32 || in_y < 0.0 || in_y >= img_h as f32 {
                continue;
            }

            let x0 = in_x.floor() as u32;
            let y0 = in_y.floor() as u32;
            let x1 = (x0 + 1).min(img_w - 1);
            let y1 = (y0 + 1).min(img_h - 1);

            let fx = in_x - x0 as f32;
            let fy = in_y - y0 as f32;

            let p00 = src.get_pixel(x0, y0);
            let p10 = src.get_pixel(x1, y0);
            let p01 = src.get_pixel(x0, y1);
            let p11 = src.get_pixel(x1, y1);

            let w00 = (1.0 - fx) * (1.0 - fy);
            let w10 = fx * (1.0 - fy);
            let w01 = (1.0 - fx) * fy;
            let w11 = fx * fy;

            let mut rgb = [0u8; 3];
            for (ch, value) in rgb.iter_mut().enumerate() {
                let v = p00[ch] as f32 * w00
                    + p10[ch] as f32 * w10
                    + p01[ch] as f32 * w01
                    + p11[ch] as f32 * w11;
                *value = v.round().clamp(0.0, 255.0) as u8;
            }

            output.put_pixel(out_x, out_y, Rgb(rgb));
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> DynamicImage {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 128]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_zero_rotation_keeps_center_fixed() {
        let m = rotation_matrix((8.0, 4.0), 0.0, 1.0);
        assert_eq!(m, Affine::identity());

        let m = rotation_matrix((8.0, 4.0), 30.0, 1.1);
        let (x, y) = m.apply(8.0, 4.0);
        assert!((x - 8.0).abs() < 1e-4);
        assert!((y - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_quarter_turn_is_counter_clockwise() {
        // y axis points down, so counter-clockwise sends +x to -y
        let m = rotation_matrix((0.0, 0.0), 90.0, 1.0);
        let (x, y) = m.apply(1.0, 0.0);
        assert!(x.abs() < 1e-5);
        assert!((y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_identity_warp_is_lossless() -> Result<()> {
        let img = gradient(12, 9);
        let warped = warp_affine(&img, &Affine::identity())?;
        assert_eq!(warped.as_raw(), img.to_rgb8().as_raw());
        Ok(())
    }

    #[test]
    fn test_singular_transform_rejected() {
        let img = gradient(4, 4);
        let m = rotation_matrix((2.0, 2.0), 10.0, 0.0);
        assert!(warp_affine(&img, &m).is_err());
    }
}
