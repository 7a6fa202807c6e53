//! Binary STL encoding and decoding.
//!
//! Layout: an 80-byte header (which must not begin with the ASCII token
//! `"solid"`, or some readers misclassify the file as ASCII STL), a
//! little-endian `u32` triangle count, then 50 bytes per triangle:
//! a unit normal computed from the face winding (zero if degenerate),
//! three vertex positions, and a zero attribute byte count — all 32-bit
//! little-endian IEEE-754.

use std::io::Write;
use std::path::Path;

use arbor_math::Point3;
use arbor_mesh::TriangleMesh;

use crate::CadError;

/// Informative tag placed at the start of the 80-byte header.
const HEADER_TAG: &[u8] = b"arbor binary STL";

/// Size of one encoded triangle record.
const TRIANGLE_RECORD: usize = 50;

/// Encode a mesh as binary STL bytes.
pub fn to_stl_bytes(mesh: &TriangleMesh) -> Result<Vec<u8>, CadError> {
    let count = mesh.num_triangles();
    let mut data = Vec::with_capacity(84 + count * TRIANGLE_RECORD);

    let mut header = [0u8; 80];
    header[..HEADER_TAG.len()].copy_from_slice(HEADER_TAG);
    debug_assert!(!header.starts_with(b"solid"));
    data.extend_from_slice(&header);
    data.extend_from_slice(&(count as u32).to_le_bytes());

    for i in 0..count {
        let normal = mesh.face_normal(i);
        for component in [normal.x, normal.y, normal.z] {
            data.extend_from_slice(&(component as f32).to_le_bytes());
        }
        for vertex in mesh.triangle(i) {
            for component in [vertex.x, vertex.y, vertex.z] {
                data.extend_from_slice(&(component as f32).to_le_bytes());
            }
        }
        data.extend_from_slice(&0u16.to_le_bytes());
    }

    Ok(data)
}

/// Decode binary STL bytes into a triangle soup mesh.
///
/// Each record contributes three fresh vertices; no welding is attempted.
pub fn from_stl_bytes(bytes: &[u8]) -> Result<TriangleMesh, CadError> {
    if bytes.len() < 84 {
        return Err(CadError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "STL shorter than its 84-byte prelude",
        )));
    }
    let count = u32::from_le_bytes(bytes[80..84].try_into().unwrap()) as usize;
    let expected = 84 + count * TRIANGLE_RECORD;
    if bytes.len() != expected {
        return Err(CadError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "STL length {} does not match {} declared triangles",
                bytes.len(),
                count
            ),
        )));
    }

    let mut mesh = TriangleMesh::new();
    for t in 0..count {
        let record = &bytes[84 + t * TRIANGLE_RECORD..84 + (t + 1) * TRIANGLE_RECORD];
        let base = mesh.num_vertices() as u32;
        // Skip the 12 normal bytes; the winding is authoritative
        for v in 0..3 {
            let at = 12 + v * 12;
            let x = f32::from_le_bytes(record[at..at + 4].try_into().unwrap());
            let y = f32::from_le_bytes(record[at + 4..at + 8].try_into().unwrap());
            let z = f32::from_le_bytes(record[at + 8..at + 12].try_into().unwrap());
            mesh.vertices.push(Point3::new(x as f64, y as f64, z as f64));
        }
        mesh.faces.push([base, base + 1, base + 2]);
    }
    Ok(mesh)
}

/// Write a mesh to a binary STL file atomically.
///
/// The bytes are buffered fully, written to a scoped temporary in the
/// destination directory, and persisted only on success; the temporary
/// is removed on every failure path.
pub fn write_stl_file(mesh: &TriangleMesh, path: impl AsRef<Path>) -> Result<(), CadError> {
    let path = path.as_ref();
    let bytes = to_stl_bytes(mesh)?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new()?,
    };
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| CadError::Io(e.error))?;
    Ok(())
}
