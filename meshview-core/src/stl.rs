/// STL decoding for binary and ASCII files
use nom::{
    bytes::complete::tag,
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::many0,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::error::LoadError;
use crate::geometry::{Mesh, Triangle, Vertex};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, LoadError> {
    if data.len() < HEADER_LEN + 4 {
        return Err(LoadError::Stl("file too small to be a valid STL".to_string()));
    }

    let data = &data[HEADER_LEN..];
    let triangle_count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let expected = triangle_count
        .checked_mul(FACET_LEN)
        .and_then(|len| len.checked_add(4));
    if expected.map_or(true, |len| len > data.len()) {
        return Err(LoadError::Stl(format!(
            "header declares {} facets but only {} bytes follow",
            triangle_count,
            data.len() - 4
        )));
    }

    let mut mesh = Mesh::with_capacity(triangle_count);
    let mut offset = 4;

    for _ in 0..triangle_count {
        if offset + FACET_LEN > data.len() {
            return Err(LoadError::Stl("unexpected end of file".to_string()));
        }

        let nx = read_f32(data, offset);
        let ny = read_f32(data, offset + 4);
        let nz = read_f32(data, offset + 8);
        offset += 12;

        let mut vertices = [Vertex::new(0.0, 0.0, 0.0, nx, ny, nz); 3];
        for vertex in &mut vertices {
            let x = read_f32(data, offset);
            let y = read_f32(data, offset + 4);
            let z = read_f32(data, offset + 8);
            *vertex = Vertex::new(x, y, z, nx, ny, nz);
            offset += 12;
        }

        // attribute byte count
        offset += 2;

        let mut triangle = Triangle::new(vertices[0], vertices[1], vertices[2]);
        fill_missing_normal(&mut triangle);
        mesh.add_triangle(triangle);
    }

    Ok(mesh)
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, LoadError> {
    match parse_ascii_stl_impl(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(LoadError::Stl(format!("failed to parse ASCII STL: {:?}", e))),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Mesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _) = not_line_ending(input)?; // solid name
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;

    let mut mesh = Mesh::with_capacity(triangles.len());
    for mut triangle in triangles {
        fill_missing_normal(&mut triangle);
        mesh.add_triangle(triangle);
    }

    Ok((input, mesh))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input, normal)?;
    let (input, v2) = parse_vertex(input, normal)?;
    let (input, v3) = parse_vertex(input, normal)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str, normal: (f32, f32, f32)) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Vertex::new(x, y, z, normal.0, normal.1, normal.2)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

/// Exporters often write zero normals; derive them from the winding instead
fn fill_missing_normal(triangle: &mut Triangle) {
    if triangle.vertices.iter().all(|v| v.normal.norm_squared() > 0.0) {
        return;
    }
    let normal = triangle.calculate_normal();
    for vertex in &mut triangle.vertices {
        vertex.normal = normal;
    }
}

/// A binary file's length is fully determined by its facet count
fn looks_binary(data: &[u8]) -> bool {
    if data.len() < HEADER_LEN + 4 {
        return false;
    }
    let count = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;
    count
        .checked_mul(FACET_LEN)
        .and_then(|body| body.checked_add(HEADER_LEN + 4))
        == Some(data.len())
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<Mesh, LoadError> {
    // Binary headers are free text and may also start with "solid"
    if looks_binary(data) {
        return parse_binary_stl(data);
    }

    if data.len() > 5 && &data[0..5] == b"solid" {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(mesh) = parse_ascii_stl(text) {
                return Ok(mesh);
            }
        }
    }

    parse_binary_stl(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_with_one_facet() -> Vec<u8> {
        let mut data = vec![0u8; 84];
        data[80..84].copy_from_slice(&1u32.to_le_bytes());
        let floats: [f32; 12] = [
            0.0, 0.0, 1.0, // normal
            0.0, 0.0, 0.0, // v0
            1.0, 0.0, 0.0, // v1
            0.0, 1.0, 0.0, // v2
        ];
        for f in floats {
            data.extend_from_slice(&f.to_le_bytes());
        }
        data.extend_from_slice(&[0, 0]);
        data
    }

    #[test]
    fn test_parse_binary_header() {
        let mut data = vec![0u8; 84];
        data[80..84].copy_from_slice(&0u32.to_le_bytes());

        let result = parse_binary_stl(&data);
        assert!(result.is_ok());
        let mesh = result.unwrap();
        assert_eq!(mesh.triangles.len(), 0);
    }

    #[test]
    fn test_parse_binary_facet() {
        let mesh = parse_stl(&binary_with_one_facet()).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.triangles[0].vertices[1].position.x, 1.0);
    }

    #[test]
    fn test_binary_header_starting_with_solid() {
        let mut data = binary_with_one_facet();
        data[..5].copy_from_slice(b"solid");
        let mesh = parse_stl(&data).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
    }

    #[test]
    fn test_truncated_binary_fails() {
        let mut data = binary_with_one_facet();
        data.truncate(100);
        assert!(matches!(parse_stl(&data), Err(LoadError::Stl(_))));
    }

    #[test]
    fn test_parse_named_ascii_solid() {
        let text = "solid bracket\n\
            facet normal 0 0 0\n\
              outer loop\n\
                vertex 0 0 0\n\
                vertex 1 0 0\n\
                vertex 0 1 0\n\
              endloop\n\
            endfacet\n\
            endsolid bracket\n";
        let mesh = parse_stl(text.as_bytes()).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
        // zero normal replaced by the winding normal
        assert!((mesh.triangles[0].vertices[0].normal.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_truncated_ascii_is_an_error() {
        let facet = "facet normal 0 0 1\n\
              outer loop\n\
                vertex 0 0 0\n\
                vertex 1 0 0\n\
                vertex 0 1 0\n\
              endloop\n\
            endfacet\n";
        let text = format!("solid part\n{}endsolid part\n", facet.repeat(4));
        let bytes = &text.as_bytes()[..text.len() - 30];
        assert!(matches!(parse_stl(bytes), Err(LoadError::Stl(_))));
    }

    #[test]
    fn test_oversized_facet_count_is_an_error() {
        let mut data = binary_with_one_facet();
        data[80..84].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(parse_binary_stl(&data), Err(LoadError::Stl(_))));
    }
}
