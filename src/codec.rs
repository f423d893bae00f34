//! # Genotype Codecs
//!
//! Two reversible encodings of a genome.
//!
//! The text form is a length token followed by one token per gene. Integers
//! are written as a type tag, the decimal value and a closing `|`
//! (`b`, `s`, `i`, `l` for 8, 16, 32 and 64 bits). Floats carry their exact
//! bit pattern followed by a human-readable rendering that decoding ignores
//! (`f<bits>|<value>|`, `d<bits>|<value>|`), so parse and print round-trip
//! exactly. Bits are `T` or `F`. Whitespace between tokens is skipped.
//!
//! The binary form is a big-endian `i32` length followed by big-endian
//! fixed-width elements, one byte per bit.
//!
//! ## Example
//!
//! ```rust
//! use vecgen::codec::{TextDecoder, TextEncoder};
//!
//! let mut out = TextEncoder::new();
//! out.write_int(3);
//! out.write_double(0.5);
//! out.write_bool(true);
//! assert_eq!(out.as_str(), "i3|d4602678819172646912|0.5|T");
//!
//! let mut input = TextDecoder::new(out.as_str());
//! assert_eq!(input.read_int().unwrap(), 3);
//! assert_eq!(input.read_double().unwrap(), 0.5);
//! assert!(input.read_bool().unwrap());
//! ```

use std::str::FromStr;

use crate::error::{GeneticError, Result};
use crate::individual::{Gene, Genome};
use crate::species::GenomeKind;

/// Builds the text form token by token.
#[derive(Debug, Default, Clone)]
pub struct TextEncoder {
    out: String,
}

impl TextEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bool(&mut self, value: bool) {
        self.out.push(if value { 'T' } else { 'F' });
    }

    pub fn write_byte(&mut self, value: i8) {
        self.tagged('b', value);
    }

    pub fn write_short(&mut self, value: i16) {
        self.tagged('s', value);
    }

    pub fn write_int(&mut self, value: i32) {
        self.tagged('i', value);
    }

    pub fn write_long(&mut self, value: i64) {
        self.tagged('l', value);
    }

    pub fn write_float(&mut self, value: f32) {
        self.tagged('f', value.to_bits() as i32);
        self.out.push_str(&format!("{}|", value));
    }

    pub fn write_double(&mut self, value: f64) {
        self.tagged('d', value.to_bits() as i64);
        self.out.push_str(&format!("{}|", value));
    }

    /// Writes a free-form string. It must not contain line breaks when the
    /// text is later split into lines.
    pub fn write_raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn tagged(&mut self, tag: char, value: impl std::fmt::Display) {
        self.out.push(tag);
        self.out.push_str(&value.to_string());
        self.out.push('|');
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

/// Reads the text form token by token.
#[derive(Debug, Clone)]
pub struct TextDecoder<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> TextDecoder<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True once only whitespace remains.
    pub fn is_at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.text.len()
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn next_char(&mut self) -> Result<char> {
        self.skip_whitespace();
        let c = self
            .rest()
            .chars()
            .next()
            .ok_or_else(|| GeneticError::codec(self.pos, "unexpected end of input"))?;
        self.pos += c.len_utf8();
        Ok(c)
    }

    /// Consumes the literal `expected`, after optional whitespace.
    pub fn expect(&mut self, expected: &str) -> Result<()> {
        self.skip_whitespace();
        if self.rest().starts_with(expected) {
            self.pos += expected.len();
            Ok(())
        } else {
            Err(GeneticError::codec(
                self.pos,
                format!("expected '{}'", expected),
            ))
        }
    }

    fn until_bar(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let end = rest
            .find('|')
            .ok_or_else(|| GeneticError::codec(self.pos, "missing '|' terminator"))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    fn tagged<T: FromStr>(&mut self, tag: char, what: &str) -> Result<T> {
        let start = self.pos;
        let found = self.next_char()?;
        if found != tag {
            return Err(GeneticError::codec(
                start,
                format!("expected {} token '{}', found '{}'", what, tag, found),
            ));
        }
        let at = self.pos;
        let raw = self.until_bar()?;
        raw.parse::<T>()
            .map_err(|_| GeneticError::codec(at, format!("malformed {} '{}'", what, raw)))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let at = self.pos;
        match self.next_char()? {
            'T' => Ok(true),
            'F' => Ok(false),
            other => Err(GeneticError::codec(
                at,
                format!("expected 'T' or 'F', found '{}'", other),
            )),
        }
    }

    pub fn read_byte(&mut self) -> Result<i8> {
        self.tagged('b', "byte")
    }

    pub fn read_short(&mut self) -> Result<i16> {
        self.tagged('s', "short")
    }

    pub fn read_int(&mut self) -> Result<i32> {
        self.tagged('i', "int")
    }

    pub fn read_long(&mut self) -> Result<i64> {
        self.tagged('l', "long")
    }

    pub fn read_float(&mut self) -> Result<f32> {
        let bits: i32 = self.tagged('f', "float")?;
        self.until_bar()?;
        Ok(f32::from_bits(bits as u32))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        let bits: i64 = self.tagged('d', "double")?;
        self.until_bar()?;
        Ok(f64::from_bits(bits as u64))
    }

    fn read_len(&mut self) -> Result<usize> {
        let at = self.pos;
        let len = self.read_int()?;
        usize::try_from(len).map_err(|_| GeneticError::codec(at, format!("negative length {}", len)))
    }
}

/// Builds the binary form.
#[derive(Debug, Default, Clone)]
pub struct BinaryWriter {
    out: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bool(&mut self, value: bool) {
        self.out.push(u8::from(value));
    }

    pub fn write_i8(&mut self, value: i8) {
        self.out.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.out.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.out.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.out.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.out.extend_from_slice(&value.to_bits().to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.out.extend_from_slice(&value.to_bits().to_be_bytes());
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len).map_err(|_| {
            GeneticError::codec(self.out.len(), format!("length {} does not fit in an i32", len))
        })?;
        self.write_i32(len);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

/// Reads the binary form.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            GeneticError::codec(self.pos, format!("need {} bytes, {} left", N, self.remaining()))
        })?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        self.pos = end;
        Ok(buf)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.take::<1>()?[0] != 0)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.take()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(u32::from_be_bytes(self.take()?)))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.take()?)))
    }

    fn read_len(&mut self) -> Result<usize> {
        let at = self.pos;
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| GeneticError::codec(at, format!("negative length {}", len)))
    }
}

/// Appends the text form of `genome`.
pub fn encode_genome_text(genome: &Genome, out: &mut TextEncoder) {
    // Lengths past i32::MAX are not representable in this format.
    out.write_int(genome.len() as i32);
    match genome {
        Genome::Bit(v) => v.iter().for_each(|&x| out.write_bool(x)),
        Genome::Byte(v) => v.iter().for_each(|&x| out.write_byte(x)),
        Genome::Short(v) => v.iter().for_each(|&x| out.write_short(x)),
        Genome::Int(v) => v.iter().for_each(|&x| out.write_int(x)),
        Genome::Long(v) => v.iter().for_each(|&x| out.write_long(x)),
        Genome::Float(v) => v.iter().for_each(|&x| out.write_float(x)),
        Genome::Double(v) => v.iter().for_each(|&x| out.write_double(x)),
        Genome::Gene(v) => v.iter().for_each(|g| g.encode_text(out)),
    }
}

fn read_n<T>(len: usize, mut read: impl FnMut() -> Result<T>) -> Result<Vec<T>> {
    (0..len).map(|_| read()).collect()
}

fn prototype_for(kind: GenomeKind, prototype: Option<&dyn Gene>, position: usize) -> Result<&dyn Gene> {
    prototype.ok_or_else(|| {
        GeneticError::codec(position, format!("decoding a {} genome requires a prototype gene", kind))
    })
}

/// Reads a genome of `kind` in text form. Gene vectors decode into clones of
/// `prototype`.
pub fn decode_genome_text(
    kind: GenomeKind,
    prototype: Option<&dyn Gene>,
    input: &mut TextDecoder<'_>,
) -> Result<Genome> {
    let len = input.read_len()?;
    Ok(match kind {
        GenomeKind::Bit => Genome::Bit(read_n(len, || input.read_bool())?),
        GenomeKind::Byte => Genome::Byte(read_n(len, || input.read_byte())?),
        GenomeKind::Short => Genome::Short(read_n(len, || input.read_short())?),
        GenomeKind::Int => Genome::Int(read_n(len, || input.read_int())?),
        GenomeKind::Long => Genome::Long(read_n(len, || input.read_long())?),
        GenomeKind::Float => Genome::Float(read_n(len, || input.read_float())?),
        GenomeKind::Double => Genome::Double(read_n(len, || input.read_double())?),
        GenomeKind::Gene => {
            let prototype = prototype_for(kind, prototype, input.position())?;
            Genome::Gene(read_n(len, || {
                let mut gene = prototype.box_clone();
                gene.decode_text(input)?;
                Ok(gene)
            })?)
        }
    })
}

/// Appends the binary form of `genome`.
pub fn write_genome_binary(genome: &Genome, out: &mut BinaryWriter) -> Result<()> {
    out.write_len(genome.len())?;
    match genome {
        Genome::Bit(v) => v.iter().for_each(|&x| out.write_bool(x)),
        Genome::Byte(v) => v.iter().for_each(|&x| out.write_i8(x)),
        Genome::Short(v) => v.iter().for_each(|&x| out.write_i16(x)),
        Genome::Int(v) => v.iter().for_each(|&x| out.write_i32(x)),
        Genome::Long(v) => v.iter().for_each(|&x| out.write_i64(x)),
        Genome::Float(v) => v.iter().for_each(|&x| out.write_f32(x)),
        Genome::Double(v) => v.iter().for_each(|&x| out.write_f64(x)),
        Genome::Gene(v) => v.iter().for_each(|g| g.write_binary(out)),
    }
    Ok(())
}

/// Reads a genome of `kind` in binary form.
pub fn read_genome_binary(
    kind: GenomeKind,
    prototype: Option<&dyn Gene>,
    input: &mut BinaryReader<'_>,
) -> Result<Genome> {
    let len = input.read_len()?;
    Ok(match kind {
        GenomeKind::Bit => Genome::Bit(read_n(len, || input.read_bool())?),
        GenomeKind::Byte => Genome::Byte(read_n(len, || input.read_i8())?),
        GenomeKind::Short => Genome::Short(read_n(len, || input.read_i16())?),
        GenomeKind::Int => Genome::Int(read_n(len, || input.read_i32())?),
        GenomeKind::Long => Genome::Long(read_n(len, || input.read_i64())?),
        GenomeKind::Float => Genome::Float(read_n(len, || input.read_f32())?),
        GenomeKind::Double => Genome::Double(read_n(len, || input.read_f64())?),
        GenomeKind::Gene => {
            let prototype = prototype_for(kind, prototype, input.position())?;
            Genome::Gene(read_n(len, || {
                let mut gene = prototype.box_clone();
                gene.read_binary(input)?;
                Ok(gene)
            })?)
        }
    })
}
