// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Blurhash encoding (woltapp/blurhash) over an already-decoded RGB8
//! pixel buffer. Decoding and downscaling to the 64-px-wide source
//! image happen upstream of this module; this is the pure math that
//! turns pixels into the short placeholder string.

use std::f64::consts::PI;

use crate::errors::{AmityError, AmityResult};

const BASE83_ALPHABET: &[u8; 83] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz#$%*+,-.:;=?@[]^_{|}~";

/// The component grid AmityVox always encodes with: 4 horizontal, 3
/// vertical.
pub const DEFAULT_COMPONENTS_X: usize = 4;
pub const DEFAULT_COMPONENTS_Y: usize = 3;

/// Encodes `pixels` (tightly packed RGB8, row-major, `width * height *
/// 3` bytes) into a blurhash string using the default 4x3 component
/// grid.
pub fn encode_default(width: usize, height: usize, pixels: &[u8]) -> AmityResult<String> {
    encode(width, height, DEFAULT_COMPONENTS_X, DEFAULT_COMPONENTS_Y, pixels)
}

/// Encodes `pixels` into a blurhash string with a caller-chosen
/// component grid (each axis in `1..=9`).
pub fn encode(width: usize, height: usize, components_x: usize, components_y: usize, pixels: &[u8]) -> AmityResult<String> {
    if !(1..=9).contains(&components_x) || !(1..=9).contains(&components_y) {
        return Err(AmityError::BadRequest { reason: "blurhash component counts must each be between 1 and 9".to_string() });
    }
    if width == 0 || height == 0 || pixels.len() != width * height * 3 {
        return Err(AmityError::BadRequest { reason: "blurhash pixel buffer size does not match width * height * 3".to_string() });
    }

    let bytes_per_row = width * 3;
    let mut factors = Vec::with_capacity(components_x * components_y);
    for cy in 0..components_y {
        for cx in 0..components_x {
            factors.push(basis_average(cx, cy, width, height, pixels, bytes_per_row));
        }
    }

    let dc = factors[0];
    let ac = &factors[1..];

    let mut result = String::new();
    let size_flag = (components_x - 1) + (components_y - 1) * 9;
    encode_base83(size_flag as u32, 1, &mut result);

    if ac.is_empty() {
        encode_base83(0, 1, &mut result);
        encode_base83(encode_dc(dc), 4, &mut result);
    } else {
        let actual_maximum_value = ac
            .iter()
            .flat_map(|c| c.iter().copied())
            .fold(0.0_f64, f64::max);
        let quantised_maximum_value = ((actual_maximum_value * 166.0 - 0.5).floor().clamp(0.0, 82.0)) as u32;
        let maximum_value = (quantised_maximum_value + 1) as f64 / 166.0;

        encode_base83(quantised_maximum_value, 1, &mut result);
        encode_base83(encode_dc(dc), 4, &mut result);
        for component in ac {
            encode_base83(encode_ac(*component, maximum_value), 2, &mut result);
        }
    }

    Ok(result)
}

fn basis_average(component_x: usize, component_y: usize, width: usize, height: usize, pixels: &[u8], bytes_per_row: usize) -> [f64; 3] {
    let normalisation = if component_x == 0 && component_y == 0 { 1.0 } else { 2.0 };
    let mut sum = [0.0_f64; 3];

    for y in 0..height {
        let basis_y = (PI * component_y as f64 * y as f64 / height as f64).cos();
        for x in 0..width {
            let basis = basis_y * (PI * component_x as f64 * x as f64 / width as f64).cos();
            let offset = y * bytes_per_row + x * 3;
            sum[0] += basis * srgb_to_linear(pixels[offset]);
            sum[1] += basis * srgb_to_linear(pixels[offset + 1]);
            sum[2] += basis * srgb_to_linear(pixels[offset + 2]);
        }
    }

    let scale = normalisation / (width * height) as f64;
    [sum[0] * scale, sum[1] * scale, sum[2] * scale]
}

fn encode_dc(color: [f64; 3]) -> u32 {
    let r = linear_to_srgb(color[0]) as u32;
    let g = linear_to_srgb(color[1]) as u32;
    let b = linear_to_srgb(color[2]) as u32;
    (r << 16) + (g << 8) + b
}

fn encode_ac(color: [f64; 3], maximum_value: f64) -> u32 {
    let quant = |value: f64| -> u32 {
        let v = sign_pow(value / maximum_value, 0.5);
        ((v * 9.0 + 9.5).floor().clamp(0.0, 18.0)) as u32
    };
    let r = quant(color[0]);
    let g = quant(color[1]);
    let b = quant(color[2]);
    r * 19 * 19 + g * 19 + b
}

fn sign_pow(value: f64, exponent: f64) -> f64 {
    value.signum() * value.abs().powf(exponent)
}

fn srgb_to_linear(value: u8) -> f64 {
    let v = value as f64 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(value: f64) -> u8 {
    let v = value.clamp(0.0, 1.0);
    let srgb = if v <= 0.0031308 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (srgb * 255.0).round().clamp(0.0, 255.0) as u8
}

fn encode_base83(value: u32, length: usize, out: &mut String) {
    for i in 1..=length {
        let digit = (value / 83u32.pow((length - i) as u32)) % 83;
        out.push(BASE83_ALPHABET[digit as usize] as char);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_color(width: usize, height: usize, rgb: [u8; 3]) -> Vec<u8> {
        let mut pixels = Vec::with_capacity(width * height * 3);
        for _ in 0..(width * height) {
            pixels.extend_from_slice(&rgb);
        }
        pixels
    }

    #[test]
    fn encodes_a_solid_color_image() {
        let pixels = solid_color(8, 8, [200, 50, 50]);
        let hash = encode_default(8, 8, &pixels).unwrap();
        assert_eq!(hash.len(), 6 + (DEFAULT_COMPONENTS_X * DEFAULT_COMPONENTS_Y - 1) * 2);
        assert!(hash.chars().all(|c| BASE83_ALPHABET.contains(&(c as u8))));
    }

    #[test]
    fn same_input_is_deterministic() {
        let pixels = solid_color(8, 8, [10, 20, 30]);
        let a = encode_default(8, 8, &pixels).unwrap();
        let b = encode_default(8, 8, &pixels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_mismatched_buffer_size() {
        let pixels = solid_color(8, 8, [0, 0, 0]);
        assert!(encode(8, 9, DEFAULT_COMPONENTS_X, DEFAULT_COMPONENTS_Y, &pixels).is_err());
    }

    #[test]
    fn rejects_out_of_range_components() {
        let pixels = solid_color(4, 4, [0, 0, 0]);
        assert!(encode(4, 4, 10, 3, &pixels).is_err());
    }
}
