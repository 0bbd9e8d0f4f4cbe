//! Bit-packed device pixel occupancy raster

/// One bit per device pixel, used to drop point records that land on an already drawn pixel
///
/// Owned by a single point-layer pass; never shared between passes.
#[derive(Clone, Debug)]
pub struct ScreenMap {
    width: u32,
    height: u32,
    bits: Vec<u32>,
}

impl ScreenMap {
    pub fn new(width: u32, height: u32) -> Self {
        let total = width as usize * height as usize;
        Self {
            width,
            height,
            bits: vec![0; total.div_ceil(32)],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major bit index, or `None` outside the raster
    ///
    /// Rows are `width` bits apart (`width * y + x`). A `height * y + x` layout would make
    /// distinct pixels share a bit whenever the screen is not square.
    #[inline]
    fn bit(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            tracing::debug!(
                "Screen map access out of range: ({x}, {y}) on {}x{}",
                self.width,
                self.height
            );
            return None;
        }
        Some(self.width as usize * y as usize + x as usize)
    }

    /// Whether pixel `(x, y)` is set; out-of-range pixels read as unset
    pub fn get(&self, x: i64, y: i64) -> bool {
        match self.bit(x, y) {
            Some(bit) => self.bits[bit / 32] & (1 << (bit % 32)) != 0,
            None => false,
        }
    }

    /// Set or clear pixel `(x, y)`; out-of-range pixels are ignored
    pub fn set(&mut self, x: i64, y: i64, value: bool) {
        if let Some(bit) = self.bit(x, y) {
            let mask = 1u32 << (bit % 32);
            if value {
                self.bits[bit / 32] |= mask;
            } else {
                self.bits[bit / 32] &= !mask;
            }
        }
    }

    /// Claim the pixel containing the screen coordinate `(sx, sy)`
    ///
    /// Returns `false` if the pixel was already taken.
    pub fn claim(&mut self, sx: f64, sy: f64) -> bool {
        let (x, y) = (sx.floor() as i64, sy.floor() as i64);
        if self.get(x, y) {
            return false;
        }
        self.set(x, y, true);
        true
    }

    /// Clear every pixel
    pub fn reset(&mut self) {
        self.bits.fill(0);
    }
}
