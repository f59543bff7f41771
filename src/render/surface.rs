use crate::{
    foundation::core::{Rgba8Premul, Size, Vec2},
    foundation::error::{BeatlineError, BeatlineResult},
    render::composite::{crossfade, over, scale_in_place},
};

/// CPU render target: premultiplied RGBA8, row-major, tightly packed.
///
/// Every entity owns one of these as its offscreen buffer, and the sequence
/// composites them onto a shared one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Allocate a transparent surface.
    pub fn new(size: Size) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: vec![0u8; size.area() * 4],
        }
    }

    /// Wrap existing premultiplied pixels.
    pub fn from_rgba8_premul(width: u32, height: u32, data: Vec<u8>) -> BeatlineResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| BeatlineError::render("surface size overflow"))?;
        if data.len() != expected {
            return Err(BeatlineError::render(format!(
                "surface data has {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Row-major premultiplied RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reallocate to `size`, dropping current contents.
    pub fn resize(&mut self, size: Size) {
        if self.size() == size {
            self.clear();
            return;
        }
        *self = Self::new(size);
    }

    /// Set every pixel to transparent.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Set every pixel to `color`.
    pub fn fill(&mut self, color: Rgba8Premul) {
        let px = color.to_array();
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    /// Pixel at `(x, y)`, `None` out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8Premul> {
        let idx = self.index(x, y)?;
        let p = &self.data[idx..idx + 4];
        Some(Rgba8Premul {
            r: p[0],
            g: p[1],
            b: p[2],
            a: p[3],
        })
    }

    /// Overwrites one pixel. Out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba8Premul) {
        if let Some(idx) = self.index(x, y) {
            self.data[idx..idx + 4].copy_from_slice(&color.to_array());
        }
    }

    /// Source-over blends `color` into the clipped rectangle.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgba8Premul) {
        let x0 = x.clamp(0, i64::from(self.width)) as u32;
        let y0 = y.clamp(0, i64::from(self.height)) as u32;
        let x1 = (x + i64::from(w)).clamp(0, i64::from(self.width)) as u32;
        let y1 = (y + i64::from(h)).clamp(0, i64::from(self.height)) as u32;
        let src = color.to_array();
        for yy in y0..y1 {
            for xx in x0..x1 {
                let idx = ((yy as usize) * (self.width as usize) + xx as usize) * 4;
                let d = [
                    self.data[idx],
                    self.data[idx + 1],
                    self.data[idx + 2],
                    self.data[idx + 3],
                ];
                self.data[idx..idx + 4].copy_from_slice(&over(d, src, 1.0));
            }
        }
    }

    /// Composites `src` onto `self` with its top-left corner at `at` (rounded to whole pixels).
    /// Pixels falling outside `self` are clipped.
    pub fn draw_surface(&mut self, src: &Surface, at: Vec2, opacity: f32) {
        if opacity <= 0.0 || src.width == 0 || src.height == 0 {
            return;
        }
        let ox = at.x.round() as i64;
        let oy = at.y.round() as i64;

        let dst_w = i64::from(self.width);
        let dst_h = i64::from(self.height);
        let x_start = ox.max(0);
        let y_start = oy.max(0);
        let x_end = (ox + i64::from(src.width)).min(dst_w);
        let y_end = (oy + i64::from(src.height)).min(dst_h);
        if x_start >= x_end || y_start >= y_end {
            return;
        }

        for dy in y_start..y_end {
            let sy = (dy - oy) as usize;
            for dx in x_start..x_end {
                let sx = (dx - ox) as usize;
                let si = (sy * src.width as usize + sx) * 4;
                let s = [
                    src.data[si],
                    src.data[si + 1],
                    src.data[si + 2],
                    src.data[si + 3],
                ];
                if s[3] == 0 {
                    continue;
                }
                let di = ((dy as usize) * (self.width as usize) + dx as usize) * 4;
                let d = [
                    self.data[di],
                    self.data[di + 1],
                    self.data[di + 2],
                    self.data[di + 3],
                ];
                self.data[di..di + 4].copy_from_slice(&over(d, s, opacity));
            }
        }
    }

    /// Blends `from` into `self`: `t = 0` yields `from`, `t = 1` leaves `self`.
    pub fn crossfade_from(&mut self, from: &Surface, t: f32) -> BeatlineResult<()> {
        if from.size() != self.size() {
            return Err(BeatlineError::render(format!(
                "crossfade needs equal sizes ({}x{} vs {}x{})",
                from.width, from.height, self.width, self.height
            )));
        }
        for (dst, src) in self
            .data
            .chunks_exact_mut(4)
            .zip(from.data.chunks_exact(4))
        {
            let out = crossfade(
                [src[0], src[1], src[2], src[3]],
                [dst[0], dst[1], dst[2], dst[3]],
                t,
            );
            dst.copy_from_slice(&out);
        }
        Ok(())
    }

    /// Multiplies the whole surface by `factor` (premultiplied opacity).
    pub fn multiply_opacity(&mut self, factor: f32) {
        scale_in_place(&mut self.data, factor);
    }

    /// Straight-alpha RGBA8 copy, e.g. for PNG export.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 0 {
                px[0] = 0;
                px[1] = 0;
                px[2] = 0;
                continue;
            }
            for c in px.iter_mut().take(3) {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        out
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(((y as usize) * (self.width as usize) + x as usize) * 4)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
