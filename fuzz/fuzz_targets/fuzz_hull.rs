#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use impulse_physics::{HullShape, Vec3};

#[derive(Debug, Arbitrary)]
struct HullInput {
    /// Vertex soup (quantized to keep coordinates reasonable)
    vertices: Vec<(i8, i8, i8)>,
    /// Face loops as index lists
    faces: Vec<Vec<u8>>,
}

// Fuzz hull construction: arbitrary vertex/face soup must either build a
// valid hull or return InvalidShape. Never panic.
fuzz_target!(|input: HullInput| {
    let vertices: Vec<Vec3> = input
        .vertices
        .iter()
        .take(32)
        .map(|&(x, y, z)| Vec3::new(x as f32 * 0.25, y as f32 * 0.25, z as f32 * 0.25))
        .collect();
    let faces: Vec<Vec<u32>> = input
        .faces
        .iter()
        .take(32)
        .map(|f| f.iter().take(16).map(|&i| i as u32).collect())
        .collect();

    let _ = HullShape::new(vertices, faces);
});
