//! Scalar SQL functions registered on every connection.
//!
//! - `HAMMING_DISTANCE(a BLOB, b BLOB)`: XOR + popcount, NULL when either
//!   argument is NULL or the lengths differ.
//! - `COSIM(a TEXT, b TEXT)`: dot product of two JSON float arrays, NULL when
//!   either argument is NULL or the lengths differ. Applied to normalized
//!   vectors this is the cosine similarity.

use rusqlite::Connection;
use rusqlite::functions::{Context, FunctionFlags};

use crate::vector::{dot, hamming_distance};

pub const HAMMING_DISTANCE: &str = "HAMMING_DISTANCE";
pub const COSIM: &str = "COSIM";

/// Registers both functions on `conn`.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function(HAMMING_DISTANCE, 2, flags, hamming_distance_fn)?;
    conn.create_scalar_function(COSIM, 2, flags, cosim_fn)?;

    Ok(())
}

/// Checks that both functions are callable and return the expected values.
pub fn verify(conn: &Connection) -> rusqlite::Result<()> {
    let (distance, similarity): (Option<i64>, Option<f64>) = conn.query_row(
        "SELECT HAMMING_DISTANCE(x'0f', x'0e'), COSIM('[1.0, 0.0]', '[1.0, 0.0]')",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let healthy = distance == Some(1) && similarity.is_some_and(|s| (s - 1.0).abs() < 1e-6);
    if !healthy {
        return Err(rusqlite::Error::UserFunctionError(
            format!("scoring functions returned unexpected values: {distance:?}, {similarity:?}")
                .into(),
        ));
    }
    Ok(())
}

fn hamming_distance_fn(ctx: &Context<'_>) -> rusqlite::Result<Option<i64>> {
    let a: Option<Vec<u8>> = ctx.get(0)?;
    let b: Option<Vec<u8>> = ctx.get(1)?;

    Ok(match (a, b) {
        (Some(a), Some(b)) => hamming_distance(&a, &b).map(i64::from),
        _ => None,
    })
}

fn cosim_fn(ctx: &Context<'_>) -> rusqlite::Result<Option<f64>> {
    let a: Option<String> = ctx.get(0)?;
    let b: Option<String> = ctx.get(1)?;

    let (Some(a), Some(b)) = (a, b) else {
        return Ok(None);
    };

    let a: Vec<f32> =
        serde_json::from_str(&a).map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
    let b: Vec<f32> =
        serde_json::from_str(&b).map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;

    // Mismatched lengths yield NULL
    Ok(dot(&a, &b).ok().map(f64::from))
}
