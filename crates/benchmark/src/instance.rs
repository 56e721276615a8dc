//! OPLIB instance parsing.
//!
//! The format is TSPLIB-style: `KEY : VALUE` specification lines
//! followed by data sections. Supported weights are EUC_2D (distances
//! rounded to the nearest integer, per the TSPLIB convention) and
//! EXPLICIT matrices in UPPER_ROW or LOWER_DIAG_ROW form. Prizes come
//! from NODE_SCORE_SECTION and the travel-time budget from COST_LIMIT.

use std::path::Path;

use u_orienteering_op::InstanceData;

/// Errors raised while reading an instance file.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The file could not be read.
    #[error("cannot read instance: {0}")]
    Io(#[from] std::io::Error),

    /// A specification entry is missing or malformed.
    #[error("malformed instance: {0}")]
    Malformed(String),
}

/// Parses an OPLIB instance file.
pub fn parse_instance(path: impl AsRef<Path>) -> Result<InstanceData, ParseError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "instance".to_owned());
    parse_instance_str(&contents, name)
}

/// Parses OPLIB-formatted text.
pub fn parse_instance_str(contents: &str, name: String) -> Result<InstanceData, ParseError> {
    let mut dimension: Option<usize> = None;
    let mut cost_limit: Option<f64> = None;
    let mut edge_weight_type: Option<String> = None;
    let mut edge_weight_format: Option<String> = None;

    let mut coordinates: Vec<(f64, f64)> = Vec::new();
    let mut prizes: Vec<f64> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();

    #[derive(PartialEq)]
    enum Section {
        None,
        Coords,
        Scores,
        Weights,
        Depot,
        Display,
    }
    let mut section = Section::None;
    let mut saw_coord_section = false;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Section headers and EOF switch the state.
        match line {
            "NODE_COORD_SECTION" => {
                section = Section::Coords;
                saw_coord_section = true;
                continue;
            }
            "NODE_SCORE_SECTION" => {
                section = Section::Scores;
                continue;
            }
            "EDGE_WEIGHT_SECTION" => {
                section = Section::Weights;
                continue;
            }
            "DEPOT_SECTION" => {
                section = Section::Depot;
                continue;
            }
            "DISPLAY_DATA_SECTION" => {
                section = Section::Display;
                continue;
            }
            "EOF" => break,
            _ => {}
        }

        // Specification lines reset the section state.
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if key.chars().all(|c| c.is_ascii_uppercase() || c == '_') && section == Section::None
            {
                let value = value.trim();
                match key {
                    "DIMENSION" => {
                        dimension = Some(value.parse().map_err(|_| {
                            ParseError::Malformed(format!("bad DIMENSION '{value}'"))
                        })?);
                    }
                    "COST_LIMIT" => {
                        cost_limit = Some(value.parse().map_err(|_| {
                            ParseError::Malformed(format!("bad COST_LIMIT '{value}'"))
                        })?);
                    }
                    "EDGE_WEIGHT_TYPE" => edge_weight_type = Some(value.to_owned()),
                    "EDGE_WEIGHT_FORMAT" => edge_weight_format = Some(value.to_owned()),
                    // NAME, TYPE, COMMENT and friends are informative.
                    _ => {}
                }
                continue;
            }
        }

        match section {
            Section::Coords | Section::Display => {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() != 3 {
                    return Err(ParseError::Malformed(format!(
                        "bad coordinate line '{line}'"
                    )));
                }
                // Display coordinates only matter when the instance has
                // no NODE_COORD_SECTION of its own.
                if section == Section::Coords || !saw_coord_section {
                    let x = parse_f64(fields[1])?;
                    let y = parse_f64(fields[2])?;
                    coordinates.push((x, y));
                }
            }
            Section::Scores => {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() != 2 {
                    return Err(ParseError::Malformed(format!("bad score line '{line}'")));
                }
                prizes.push(parse_f64(fields[1])?);
            }
            Section::Weights => {
                for field in line.split_whitespace() {
                    weights.push(parse_f64(field)?);
                }
            }
            Section::Depot | Section::None => {}
        }
    }

    let n_vertices =
        dimension.ok_or_else(|| ParseError::Malformed("missing DIMENSION".to_owned()))?;
    let max_travel_time =
        cost_limit.ok_or_else(|| ParseError::Malformed("missing COST_LIMIT".to_owned()))?;
    let edge_weight_type = edge_weight_type
        .ok_or_else(|| ParseError::Malformed("missing EDGE_WEIGHT_TYPE".to_owned()))?;

    if prizes.len() != n_vertices {
        return Err(ParseError::Malformed(format!(
            "expected {n_vertices} scores, found {}",
            prizes.len()
        )));
    }

    let distances = match edge_weight_type.as_str() {
        "EUC_2D" => {
            if coordinates.len() != n_vertices {
                return Err(ParseError::Malformed(format!(
                    "expected {n_vertices} coordinates, found {}",
                    coordinates.len()
                )));
            }
            euclidean_matrix(&coordinates)
        }
        "EXPLICIT" => {
            let format = edge_weight_format
                .ok_or_else(|| ParseError::Malformed("missing EDGE_WEIGHT_FORMAT".to_owned()))?;
            let matrix = expand_weights(&format, &weights, n_vertices)?;
            if coordinates.len() != n_vertices {
                // No display coordinates: collapse to the origin, the
                // geometry-driven heuristics handle it via the
                // non-Euclidean radius floor.
                coordinates = vec![(0.0, 0.0); n_vertices];
            }
            matrix
        }
        other => {
            return Err(ParseError::Malformed(format!(
                "unsupported EDGE_WEIGHT_TYPE '{other}'"
            )));
        }
    };

    log::info!(
        "parsed instance '{name}': {n_vertices} vertices, budget {max_travel_time}"
    );

    Ok(InstanceData {
        name,
        n_vertices,
        coordinates,
        prizes,
        distances,
        max_travel_time,
        edge_weight_type,
    })
}

fn parse_f64(field: &str) -> Result<f64, ParseError> {
    field
        .parse()
        .map_err(|_| ParseError::Malformed(format!("bad number '{field}'")))
}

/// TSPLIB EUC_2D: Euclidean distance rounded to the nearest integer.
fn euclidean_matrix(coordinates: &[(f64, f64)]) -> Vec<Vec<f64>> {
    let n = coordinates.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let (xi, yi) = coordinates[i];
            let (xj, yj) = coordinates[j];
            let d = ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt().round();
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }
    matrix
}

/// Expands a triangular weight listing into the full matrix.
fn expand_weights(
    format: &str,
    weights: &[f64],
    n: usize,
) -> Result<Vec<Vec<f64>>, ParseError> {
    let mut matrix = vec![vec![0.0; n]; n];
    let mut it = weights.iter().copied();

    match format {
        "UPPER_ROW" => {
            for i in 0..n {
                for j in (i + 1)..n {
                    let w = it.next().ok_or_else(|| {
                        ParseError::Malformed("EDGE_WEIGHT_SECTION too short".to_owned())
                    })?;
                    matrix[i][j] = w;
                    matrix[j][i] = w;
                }
            }
        }
        "LOWER_DIAG_ROW" => {
            for i in 0..n {
                for j in 0..=i {
                    let w = it.next().ok_or_else(|| {
                        ParseError::Malformed("EDGE_WEIGHT_SECTION too short".to_owned())
                    })?;
                    matrix[i][j] = w;
                    matrix[j][i] = w;
                }
            }
        }
        other => {
            return Err(ParseError::Malformed(format!(
                "unsupported EDGE_WEIGHT_FORMAT '{other}'"
            )));
        }
    }

    if it.next().is_some() {
        return Err(ParseError::Malformed(
            "EDGE_WEIGHT_SECTION has trailing entries".to_owned(),
        ));
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EUC_INSTANCE: &str = "\
NAME : toy5
COMMENT : five points
TYPE : OP
DIMENSION : 5
COST_LIMIT : 30
EDGE_WEIGHT_TYPE : EUC_2D
NODE_COORD_SECTION
1 0 0
2 3 4
3 6 8
4 0 5
5 5 0
NODE_SCORE_SECTION
1 0
2 10
3 20
4 30
5 40
DEPOT_SECTION
1
-1
EOF
";

    #[test]
    fn test_parse_euclidean_instance() {
        let data = parse_instance_str(EUC_INSTANCE, "toy5".to_owned()).unwrap();

        assert_eq!(data.n_vertices, 5);
        assert_eq!(data.max_travel_time, 30.0);
        assert!(data.is_euclidean());
        assert_eq!(data.prizes, vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        // 3-4-5 triangle, rounded.
        assert_eq!(data.distance(0, 1), 5.0);
        assert_eq!(data.distance(1, 2), 5.0);
        assert_eq!(data.distance(0, 3), 5.0);
        assert_eq!(data.distance(1, 0), data.distance(0, 1));
    }

    #[test]
    fn test_parse_explicit_upper_row() {
        let text = "\
NAME : m3
TYPE : OP
DIMENSION : 3
COST_LIMIT : 12
EDGE_WEIGHT_TYPE : EXPLICIT
EDGE_WEIGHT_FORMAT : UPPER_ROW
EDGE_WEIGHT_SECTION
1 2
3
NODE_SCORE_SECTION
1 0
2 7
3 9
EOF
";
        let data = parse_instance_str(text, "m3".to_owned()).unwrap();

        assert!(!data.is_euclidean());
        assert_eq!(data.distance(0, 1), 1.0);
        assert_eq!(data.distance(0, 2), 2.0);
        assert_eq!(data.distance(1, 2), 3.0);
        assert_eq!(data.distance(2, 1), 3.0);
        assert_eq!(data.coordinates.len(), 3);
    }

    #[test]
    fn test_parse_explicit_lower_diag_row() {
        let text = "\
NAME : m3
TYPE : OP
DIMENSION : 3
COST_LIMIT : 12
EDGE_WEIGHT_TYPE : EXPLICIT
EDGE_WEIGHT_FORMAT : LOWER_DIAG_ROW
EDGE_WEIGHT_SECTION
0
4 0
5 6 0
NODE_SCORE_SECTION
1 0
2 7
3 9
EOF
";
        let data = parse_instance_str(text, "m3".to_owned()).unwrap();

        assert_eq!(data.distance(0, 1), 4.0);
        assert_eq!(data.distance(0, 2), 5.0);
        assert_eq!(data.distance(1, 2), 6.0);
    }

    #[test]
    fn test_missing_cost_limit_is_an_error() {
        let text = "\
DIMENSION : 2
EDGE_WEIGHT_TYPE : EUC_2D
NODE_COORD_SECTION
1 0 0
2 1 0
NODE_SCORE_SECTION
1 0
2 1
EOF
";
        let err = parse_instance_str(text, "bad".to_owned()).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
        assert!(err.to_string().contains("COST_LIMIT"));
    }

    #[test]
    fn test_score_count_mismatch_is_an_error() {
        let text = "\
DIMENSION : 3
COST_LIMIT : 5
EDGE_WEIGHT_TYPE : EUC_2D
NODE_COORD_SECTION
1 0 0
2 1 0
3 2 0
NODE_SCORE_SECTION
1 0
2 1
EOF
";
        assert!(parse_instance_str(text, "bad".to_owned()).is_err());
    }

    #[test]
    fn test_instance_builds_a_graph() {
        let data = parse_instance_str(EUC_INSTANCE, "toy5".to_owned()).unwrap();
        let graph = u_orienteering_op::Graph::from_instance(&data).unwrap();

        assert_eq!(graph.n_vertices(), 5);
        assert_eq!(graph.max_travel_time(), 30.0);
        assert_eq!(graph.travel_time(0, 1), 5.0);
        assert!(graph.vertex(0).depot);
        // All points are within budget/2 = 15 of the depot.
        assert!(graph.vertices().iter().all(|v| v.reachable));
    }
}
