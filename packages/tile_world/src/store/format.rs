//! Line-oriented text encoding of chunk store files.
//!
//! A store file is a version line, a JSON header line holding the record
//! count and the content symbol tables, then one record per chunk:
//!
//! ```text
//! x y z
//! turn_last_touched
//! temperature
//! <12 lines of 12 terrain ids>
//! <radiation as value/count pairs>
//! f i j furn_id
//! I i j <item json, without contents>
//! C <item json, contained in the previous I item>
//! T i j trap_id
//! F i j field_id density age
//! G i j <graffiti json string>
//! S <spawn json>
//! V <vehicle json>
//! ----
//! ```

use crate::content::{
    Content,
    SymbolTables,
};
use chunk_data::*;
use std::io::{
    self,
    BufRead,
    Write,
};
use serde::{Serialize, Deserialize};
use vek::*;
use anyhow::{
    anyhow,
    bail,
    ensure,
    Context,
    Result,
};


pub const VERSION_LINE: &'static str = "# version 1";
pub const END_OF_RECORD: &'static str = "----";


/// Second line of a store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHeader {
    pub listsize: usize,
    pub terrain_key: Vec<String>,
    pub furniture_key: Vec<String>,
    pub trap_key: Vec<String>,
    #[serde(default)]
    pub field_key: Vec<String>,
}

impl StoreHeader {
    pub fn new(listsize: usize, tables: SymbolTables) -> Self {
        StoreHeader {
            listsize,
            terrain_key: tables.terrain,
            furniture_key: tables.furniture,
            trap_key: tables.traps,
            field_key: tables.fields,
        }
    }

    pub fn symbol_tables(&self) -> SymbolTables {
        SymbolTables {
            terrain: self.terrain_key.clone(),
            furniture: self.furniture_key.clone(),
            traps: self.trap_key.clone(),
            fields: self.field_key.clone(),
        }
    }
}

pub fn write_header<W: Write>(w: &mut W, header: &StoreHeader) -> io::Result<()> {
    writeln!(w, "{}", VERSION_LINE)?;
    serde_json::to_writer(&mut *w, header)?;
    writeln!(w)
}


/// Translation of ids as saved in a store file to current content ids.
#[derive(Debug, Clone, Default)]
pub struct IdRemap {
    // empty tables mean identity
    ter: Vec<TerId>,
    furn: Vec<FurnId>,
    trap: Vec<TrapId>,
    field: Vec<FieldTypeId>,
}

fn remap_table<I: Copy>(
    saved: &[String],
    kind: &str,
    null: I,
    lookup: impl Fn(&str) -> Option<I>,
) -> Vec<I> {
    saved.iter()
        .map(|symbol| lookup(symbol).unwrap_or_else(|| {
            warn!(%symbol, %kind, "unknown symbol in chunk store, replacing with null");
            null
        }))
        .collect()
}

impl IdRemap {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new(saved: &SymbolTables, content: &Content) -> Self {
        IdRemap {
            ter: remap_table(&saved.terrain, "terrain", T_NULL, |s| content.ter_id(s)),
            furn: remap_table(&saved.furniture, "furniture", F_NULL, |s| content.furn_id(s)),
            trap: remap_table(&saved.traps, "trap", TR_NULL, |s| content.trap_id(s)),
            field: remap_table(&saved.fields, "field", FD_NULL, |s| content.field_type_id(s)),
        }
    }

    fn ter(&self, raw: u16) -> TerId {
        if self.ter.is_empty() {
            return TerId(raw);
        }
        self.ter.get(raw as usize).copied().unwrap_or(T_NULL)
    }

    fn furn(&self, raw: u16) -> FurnId {
        if self.furn.is_empty() {
            return FurnId(raw);
        }
        self.furn.get(raw as usize).copied().unwrap_or(F_NULL)
    }

    fn trap(&self, raw: u16) -> TrapId {
        if self.trap.is_empty() {
            return TrapId(raw);
        }
        self.trap.get(raw as usize).copied().unwrap_or(TR_NULL)
    }

    fn field(&self, raw: u16) -> FieldTypeId {
        if self.field.is_empty() {
            return FieldTypeId(raw);
        }
        self.field.get(raw as usize).copied().unwrap_or(FD_NULL)
    }
}


/// Reads lines, keeping track of line numbers and byte offsets.
pub struct LineReader<R> {
    inner: R,
    buf: String,
    offset: u64,
    line_no: usize,
}

impl<R: BufRead> LineReader<R> {
    /// `offset` and `line_no` describe where `inner` currently is.
    pub fn new(inner: R, offset: u64, line_no: usize) -> Self {
        LineReader {
            inner,
            buf: String::new(),
            offset,
            line_no,
        }
    }

    /// Byte offset of the next line.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of the last line read, starting at 1.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub fn next_line(&mut self) -> io::Result<Option<&str>> {
        self.buf.clear();
        let n = self.inner.read_line(&mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;
        self.line_no += 1;
        Ok(Some(self.buf.trim_end_matches(&['\n', '\r'][..])))
    }

    fn expect_line(&mut self) -> Result<&str> {
        self.next_line()?.ok_or_else(|| anyhow!("unexpected end of file inside record"))
    }

    /// Skip through the end of the current record, returning the raw text.
    pub fn read_raw_record(&mut self) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        loop {
            let line = self.expect_line()?;
            raw.extend_from_slice(line.as_bytes());
            raw.push(b'\n');
            if line == END_OF_RECORD {
                return Ok(raw);
            }
        }
    }
}

/// Read and validate the version and header lines.
pub fn read_header<R: BufRead>(r: &mut LineReader<R>) -> Result<StoreHeader> {
    let version = r.expect_line()?;
    ensure!(version == VERSION_LINE, "unsupported chunk store version line {:?}", version);
    let header = r.expect_line()?;
    serde_json::from_str(header).context("parsing chunk store header")
}


pub fn write_record<W: Write>(w: &mut W, cc: Vec3<i32>, chunk: &Chunk) -> io::Result<()> {
    writeln!(w, "{} {} {}", cc.x, cc.y, cc.z)?;
    writeln!(w, "{}", chunk.turn_last_touched)?;
    writeln!(w, "{}", chunk.temperature)?;

    for y in 0..SEEY {
        let row = (0..SEEX)
            .map(|x| chunk.ter[ltc_to_lti(Vec2 { x, y })].0.to_string())
            .collect::<Vec<_>>();
        writeln!(w, "{}", row.join(" "))?;
    }

    // radiation, run length encoded
    let mut runs: Vec<(i32, u32)> = Vec::new();
    for &rad in chunk.rad.0.iter() {
        match runs.last_mut() {
            Some((val, count)) if *val == rad => *count += 1,
            _ => runs.push((rad, 1)),
        }
    }
    let runs = runs.iter()
        .map(|(val, count)| format!("{} {}", val, count))
        .collect::<Vec<_>>();
    writeln!(w, "{}", runs.join(" "))?;

    for (lti, &furn) in chunk.frn.iter() {
        if !furn.is_null() {
            let ltc = lti_to_ltc(lti);
            writeln!(w, "f {} {} {}", ltc.x, ltc.y, furn.0)?;
        }
    }
    for (lti, items) in chunk.itm.iter() {
        let ltc = lti_to_ltc(lti);
        for item in items {
            write!(w, "I {} {} ", ltc.x, ltc.y)?;
            serde_json::to_writer(&mut *w, &item.without_contents())?;
            writeln!(w)?;
            for contained in &item.contents {
                write!(w, "C ")?;
                serde_json::to_writer(&mut *w, contained)?;
                writeln!(w)?;
            }
        }
    }
    for (lti, &trap) in chunk.trp.iter() {
        if !trap.is_null() {
            let ltc = lti_to_ltc(lti);
            writeln!(w, "T {} {} {}", ltc.x, ltc.y, trap.0)?;
        }
    }
    for (lti, field) in chunk.fld.iter() {
        let ltc = lti_to_ltc(lti);
        for entry in field.iter() {
            writeln!(w, "F {} {} {} {} {}", ltc.x, ltc.y, entry.kind.0, entry.density, entry.age)?;
        }
    }
    for (lti, graffiti) in chunk.graffiti.iter() {
        if let Some(text) = graffiti {
            let ltc = lti_to_ltc(lti);
            write!(w, "G {} {} ", ltc.x, ltc.y)?;
            serde_json::to_writer(&mut *w, text)?;
            writeln!(w)?;
        }
    }
    for spawn in &chunk.spawns {
        write!(w, "S ")?;
        serde_json::to_writer(&mut *w, spawn)?;
        writeln!(w)?;
    }
    for vehicle in &chunk.vehicles {
        write!(w, "V ")?;
        serde_json::to_writer(&mut *w, vehicle)?;
        writeln!(w)?;
    }
    writeln!(w, "{}", END_OF_RECORD)
}

fn parse_num<T>(s: &str, what: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.parse().with_context(|| format!("invalid {} {:?}", what, s))
}

/// Parse a record's leading coordinate line.
pub fn parse_cc(line: &str) -> Result<Vec3<i32>> {
    let mut parts = line.split_whitespace();
    let mut next = || parts.next().ok_or_else(|| anyhow!("short coordinate line {:?}", line));
    let x = parse_num(next()?, "x")?;
    let y = parse_num(next()?, "y")?;
    let z = parse_num(next()?, "z")?;
    Ok(Vec3 { x, y, z })
}

// parse "i j" at the start of a typed line into an lti
fn parse_lti<'a>(parts: &mut impl Iterator<Item=&'a str>) -> Result<u8> {
    let x = parse_num(parts.next().ok_or_else(|| anyhow!("missing x"))?, "x")?;
    let y = parse_num(parts.next().ok_or_else(|| anyhow!("missing y"))?, "y")?;
    let ltc = Vec2 { x, y };
    ensure!(ltc_in_chunk(ltc), "tile {:?} outside chunk", ltc);
    Ok(ltc_to_lti(ltc))
}

/// Read one record, or `None` at end of file.
pub fn read_record<R: BufRead>(
    r: &mut LineReader<R>,
    remap: &IdRemap,
) -> Result<Option<(Vec3<i32>, Chunk)>> {
    let cc = match r.next_line()? {
        Some(line) => parse_cc(line)?,
        None => return Ok(None),
    };
    let mut chunk = Chunk::default();
    chunk.turn_last_touched = parse_num(r.expect_line()?, "turn")?;
    chunk.temperature = parse_num(r.expect_line()?, "temperature")?;

    for y in 0..SEEY {
        let line = r.expect_line()?;
        let mut count = 0;
        for (x, raw) in line.split_whitespace().enumerate() {
            ensure!((x as i32) < SEEX, "terrain row {} too long", y);
            let lti = ltc_to_lti(Vec2 { x: x as i32, y });
            chunk.ter[lti] = remap.ter(parse_num(raw, "terrain id")?);
            count += 1;
        }
        ensure!(count == SEEX, "terrain row {} too short", y);
    }

    let line = r.expect_line()?;
    let mut parts = line.split_whitespace();
    let mut lti = 0usize;
    while let Some(val) = parts.next() {
        let val: i32 = parse_num(val, "radiation")?;
        let count: usize = parse_num(parts.next().ok_or_else(|| anyhow!("radiation run without count"))?, "radiation count")?;
        ensure!(count <= NUM_LTIS - lti, "radiation runs exceed chunk");
        for i in lti..lti + count {
            chunk.rad[i as u8] = val;
        }
        lti += count;
    }
    ensure!(lti == NUM_LTIS, "radiation runs cover {} of {} tiles", lti, NUM_LTIS);

    // tile and index of the last top level item, for C lines
    let mut last_item: Option<(u8, usize)> = None;
    loop {
        let line = r.expect_line()?;
        if line == END_OF_RECORD {
            break;
        }
        let (tag, rest) = line.split_once(' ').unwrap_or((line, ""));
        match tag {
            "f" => {
                let mut parts = rest.split_whitespace();
                let lti = parse_lti(&mut parts)?;
                chunk.frn[lti] = remap.furn(parse_num(parts.next().unwrap_or(""), "furniture id")?);
            }
            "I" => {
                let mut parts = rest.splitn(3, ' ');
                let lti = parse_lti(&mut parts)?;
                let item: Item = serde_json::from_str(parts.next().unwrap_or(""))
                    .context("parsing item")?;
                chunk.itm[lti].push(item);
                last_item = Some((lti, chunk.itm[lti].len() - 1));
            }
            "C" => {
                let (lti, i) = last_item.ok_or_else(|| anyhow!("contained item without container"))?;
                let item: Item = serde_json::from_str(rest).context("parsing contained item")?;
                chunk.itm[lti][i].put_in(item);
            }
            "T" => {
                let mut parts = rest.split_whitespace();
                let lti = parse_lti(&mut parts)?;
                chunk.trp[lti] = remap.trap(parse_num(parts.next().unwrap_or(""), "trap id")?);
            }
            "F" => {
                let mut parts = rest.split_whitespace();
                let lti = parse_lti(&mut parts)?;
                let kind = remap.field(parse_num(parts.next().unwrap_or(""), "field id")?);
                let density = parse_num(parts.next().unwrap_or(""), "field density")?;
                let age = parse_num(parts.next().unwrap_or(""), "field age")?;
                chunk.fld[lti].add(kind, density, age);
            }
            "G" => {
                let mut parts = rest.splitn(3, ' ');
                let lti = parse_lti(&mut parts)?;
                let text: String = serde_json::from_str(parts.next().unwrap_or(""))
                    .context("parsing graffiti")?;
                chunk.graffiti[lti] = Some(text);
            }
            "S" => {
                chunk.spawns.push(serde_json::from_str(rest).context("parsing spawn")?);
            }
            "V" => {
                chunk.vehicles.push(serde_json::from_str(rest).context("parsing vehicle")?);
            }
            _ => bail!("unknown record line {:?}", line),
        }
    }

    Ok(Some((cc, chunk)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_chunk() -> Chunk {
        let mut chunk = Chunk::new(TerId(3));
        chunk.turn_last_touched = 1234;
        chunk.temperature = -7;
        chunk.ter[5] = TerId(7);
        chunk.frn[17] = FurnId(2);
        chunk.trp[143] = TrapId(1);
        chunk.rad[0] = 40;
        chunk.rad[1] = 40;
        chunk.rad[100] = 5;
        chunk.fld[12].add(FieldTypeId(3), 2, 15);
        chunk.fld[12].add(FieldTypeId(1), 3, 0);
        let mut bag = Item::new("bag");
        bag.put_in(Item::new("rock").with_charges(3));
        let mut box_ = Item::new("box");
        box_.put_in(Item::new("lighter"));
        chunk.itm[30].push(bag);
        chunk.itm[30].push(box_);
        chunk.itm[31].push(Item::new("rock"));
        chunk.graffiti[60] = Some("kilroy was here".to_owned());
        chunk.spawns.push(SpawnPoint::new("mon_zombie", 2, Vec2::new(3, 4)));
        chunk.vehicles.push(Vehicle::new("cart", vec![
            VehiclePart::new(Vec2::zero(), PartFlags { obstacle: true, ..Default::default() }),
        ]));
        chunk
    }

    fn read_one(bytes: &[u8], remap: &IdRemap) -> Result<Option<(Vec3<i32>, Chunk)>> {
        read_record(&mut LineReader::new(Cursor::new(bytes), 0, 0), remap)
    }

    #[test]
    fn record_reads_back_identically() {
        let chunk = sample_chunk();
        let mut bytes = Vec::new();
        write_record(&mut bytes, Vec3::new(-3, 8, 1), &chunk).unwrap();
        let (cc, read) = read_one(&bytes, &IdRemap::identity()).unwrap().unwrap();
        assert_eq!(cc, Vec3::new(-3, 8, 1));
        assert_eq!(read, chunk);
        assert_eq!(read.itm[30][0].contents[0].charges, 3);
    }

    #[test]
    fn radiation_is_run_length_encoded() {
        let chunk = sample_chunk();
        let mut bytes = Vec::new();
        write_record(&mut bytes, Vec3::zero(), &chunk).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let rad_line = text.lines().nth(15).unwrap();
        assert_eq!(rad_line, "40 2 0 98 5 1 0 43");
    }

    #[test]
    fn graffiti_keeps_line_breaks() {
        let mut chunk = Chunk::default();
        chunk.graffiti[7] = Some("the end\nis near \"soon\"".to_owned());
        let mut bytes = Vec::new();
        write_record(&mut bytes, Vec3::zero(), &chunk).unwrap();
        let (_, read) = read_one(&bytes, &IdRemap::identity()).unwrap().unwrap();
        assert_eq!(read.graffiti[7].as_deref(), Some("the end\nis near \"soon\""));
    }

    #[test]
    fn oversized_radiation_run_is_an_error() {
        let mut bytes = Vec::new();
        write_record(&mut bytes, Vec3::zero(), &Chunk::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines().map(str::to_owned).collect::<Vec<_>>();
        lines[15] = format!("0 1 7 {}", usize::MAX);
        let text = lines.join("\n") + "\n";
        assert!(read_one(text.as_bytes(), &IdRemap::identity()).is_err());
    }

    #[test]
    fn remap_by_symbol() {
        let content = Content::builtin();
        let saved = SymbolTables {
            terrain: vec!["t_null".into(), "t_wall".into(), "t_gone".into()],
            furniture: vec!["f_null".into(), "f_table".into()],
            traps: vec!["tr_null".into()],
            fields: vec!["fd_null".into(), "fd_smoke".into()],
        };
        let remap = IdRemap::new(&saved, &content);
        let mut chunk = Chunk::new(TerId(1));
        chunk.ter[0] = TerId(2);
        chunk.frn[1] = FurnId(1);
        chunk.fld[2].add(FieldTypeId(1), 1, 0);
        let mut bytes = Vec::new();
        write_record(&mut bytes, Vec3::zero(), &chunk).unwrap();
        let (_, read) = read_one(&bytes, &remap).unwrap().unwrap();
        assert_eq!(read.ter[1], content.ter_id("t_wall").unwrap());
        assert_eq!(read.ter[0], T_NULL);
        assert_eq!(read.frn[1], content.furn_id("f_table").unwrap());
        let smoke = content.field_type_id("fd_smoke").unwrap();
        assert!(read.fld[2].get(smoke).is_some());
    }

    #[test]
    fn truncated_record_is_an_error() {
        let mut bytes = Vec::new();
        write_record(&mut bytes, Vec3::zero(), &sample_chunk()).unwrap();
        bytes.truncate(bytes.len() - 6);
        assert!(read_one(&bytes, &IdRemap::identity()).is_err());
    }

    #[test]
    fn contained_item_needs_container() {
        let mut bytes = Vec::new();
        write_record(&mut bytes, Vec3::zero(), &Chunk::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap()
            .replace("----", "C {\"type_id\":\"rock\"}\n----");
        assert!(read_one(text.as_bytes(), &IdRemap::identity()).is_err());
    }

    #[test]
    fn empty_input_has_no_record() {
        assert!(read_one(b"", &IdRemap::identity()).unwrap().is_none());
    }

    #[test]
    fn header_version_checked() {
        let mut bytes = Vec::new();
        write_header(&mut bytes, &StoreHeader::new(0, Content::builtin().symbol_tables())).unwrap();
        let header = read_header(&mut LineReader::new(Cursor::new(&bytes), 0, 0)).unwrap();
        assert_eq!(header.terrain_key[0], "t_null");
        let bad = String::from_utf8(bytes).unwrap().replace("version 1", "version 9");
        assert!(read_header(&mut LineReader::new(Cursor::new(bad.as_bytes()), 0, 0)).is_err());
    }
}
