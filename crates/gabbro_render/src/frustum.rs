use glam::{Mat4, Vec3, Vec4};

use gabbro_shared::coords::{normal_unit, NORMAL_ANY, NORMAL_NONE};

/// Camera position plus the five half-space planes the culling kernel
/// tests, each as (n, d) with `n . p + d >= 0` meaning inside. The near
/// plane is deliberately absent: a mesh straddling it is still drawn.
#[derive(Debug, Clone, Copy)]
pub struct CameraFrustum {
    pub position: Vec3,
    pub far: Vec4,
    pub left: Vec4,
    pub right: Vec4,
    pub down: Vec4,
    pub up: Vec4,
}

impl CameraFrustum {
    /// Extract the planes from a view-projection matrix (Gribb/Hartmann
    /// row combinations, normalized).
    pub fn from_view_proj(view_proj: Mat4, position: Vec3) -> Self {
        let m = view_proj.to_cols_array_2d();
        let row = |i: usize| Vec4::new(m[0][i], m[1][i], m[2][i], m[3][i]);
        let row0 = row(0);
        let row1 = row(1);
        let row2 = row(2);
        let row3 = row(3);

        Self {
            position,
            far: normalize_plane(row3 - row2),
            left: normalize_plane(row3 + row0),
            right: normalize_plane(row3 - row0),
            down: normalize_plane(row3 + row1),
            up: normalize_plane(row3 - row1),
        }
    }

    /// Test order of the kernel: far, left, right, down, up.
    pub fn planes(&self) -> [Vec4; 5] {
        [self.far, self.left, self.right, self.down, self.up]
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.truncate().length();
    if length > 0.0001 {
        plane / length
    } else {
        plane
    }
}

/// CPU mirror of the culling kernel, used by tests and diagnostics. A mesh
/// survives when its directional back face is not wholly on the camera's
/// side and its box reaches inside every plane.
pub fn mesh_visible(center: Vec3, half_size: Vec3, normal: u32, frustum: &CameraFrustum) -> bool {
    if normal >= NORMAL_NONE {
        return false;
    }

    if normal < NORMAL_ANY {
        let dir = normal_unit(normal);
        let back_face = center - dir * half_size;
        if (back_face - frustum.position).dot(dir) > 0.0 {
            return false;
        }
    }

    for plane in frustum.planes() {
        let n = plane.truncate();
        let closest = center + half_size * n.signum();
        if n.dot(closest) + plane.w < 0.0 {
            return false;
        }
    }
    true
}
