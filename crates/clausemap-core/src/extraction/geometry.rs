/// 2D affine transform in PDF notation `[a b c d e f]`.
///
/// Points are row vectors: `[x y 1] × M`, so `x' = a·x + c·y + e` and
/// `y' = b·x + d·y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub fn identity() -> Self {
        Matrix {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::identity()
        }
    }

    /// Build from the first six operands of `cm`, `Tm` or a `/Matrix` entry.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        if values.len() < 6 {
            return None;
        }
        Some(Matrix {
            a: values[0],
            b: values[1],
            c: values[2],
            d: values[3],
            e: values[4],
            f: values[5],
        })
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

/// Axis-aligned rectangle in PDF user space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut r = Rect {
            min_x: x0,
            min_y: y0,
            max_x: x0,
            max_y: y0,
        };
        for &(x, y) in rest {
            r.min_x = r.min_x.min(x);
            r.min_y = r.min_y.min(y);
            r.max_x = r.max_x.max(x);
            r.max_y = r.max_y.max(y);
        }
        Some(r)
    }

    /// Map a text-space rectangle through `m` and take the axis-aligned hull.
    pub fn transformed(&self, m: &Matrix) -> Rect {
        let corners = [
            m.apply(self.min_x, self.min_y),
            m.apply(self.max_x, self.min_y),
            m.apply(self.min_x, self.max_y),
            m.apply(self.max_x, self.max_y),
        ];
        // Four corners are always present.
        Rect::from_points(&corners).unwrap_or(*self)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Default MediaBox (US Letter) for pages that do not declare one.
pub const DEFAULT_MEDIA_BOX: Rect = Rect {
    min_x: 0.0,
    min_y: 0.0,
    max_x: 612.0,
    max_y: 792.0,
};
