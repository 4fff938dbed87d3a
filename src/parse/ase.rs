//! Reader for 3ds Max ASCII Scene Export (`.ase`) files.
//!
//! Per `*GEOMOBJECT` the reader extracts vertex positions, triangles with their
//! smoothing groups and material ids, texture-coordinate channels, vertex
//! colours, stored normals and the node transform. Blocks it does not know are
//! skipped by brace matching.

use thiserror::Error;

use crate::geom::{Point3, SmoothingFace, SmoothingMesh, Transform, Vec3};

/// Result type for ASE parsing.
pub type ParseResult<T> = Result<T, AseError>;

/// Errors while reading an ASE document. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AseError {
    #[error("line {line}: expected {expected}, found `{found}`")]
    Unexpected {
        line: usize,
        expected: &'static str,
        found: String,
    },
    #[error("line {line}: unexpected end of input, expected {expected}")]
    UnexpectedEof { line: usize, expected: &'static str },
    #[error("line {line}: invalid number `{text}`")]
    Number { line: usize, text: String },
    #[error("line {line}: vertex index {index} out of range ({count} vertices)")]
    VertexIndex {
        line: usize,
        index: usize,
        count: usize,
    },
    #[error("line {line}: {keyword} {count} exceeds the remaining input")]
    DeclaredCount {
        line: usize,
        keyword: &'static str,
        count: usize,
    },
    #[error("line {line}: unmatched closing brace")]
    UnbalancedBraces { line: usize },
}

/// All geometry objects of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AseScene {
    pub meshes: Vec<AseMesh>,
    /// Value of `*MATERIAL_COUNT`, `0` if the document has no material list.
    pub material_count: usize,
}

/// Vertex data that ASE indexes separately from the positions: every face
/// carries its own index triple into `values`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AseAttribute {
    pub values: Vec<[f64; 3]>,
    /// One index triple per face, parallel to the mesh faces.
    pub faces: Vec<[u32; 3]>,
}

impl AseAttribute {
    /// Copy with one value per face corner: face `f` uses `3f`, `3f + 1` and
    /// `3f + 2`, matching [`SmoothingMesh::unjoined`].
    #[must_use]
    pub fn unjoined(&self) -> Self {
        let mut values = Vec::with_capacity(self.faces.len() * 3);
        let mut faces = Vec::with_capacity(self.faces.len());

        for tri in &self.faces {
            let base = values.len() as u32;
            for &i in tri {
                values.push(self.values.get(i as usize).copied().unwrap_or_default());
            }
            faces.push([base, base + 1, base + 2]);
        }

        Self { values, faces }
    }

    #[must_use]
    pub fn values_flat(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    #[must_use]
    pub fn indices_flat(&self) -> Vec<u32> {
        self.faces.iter().flatten().copied().collect()
    }
}

/// One texture-coordinate channel. The base channel of a mesh is number 1,
/// `*MESH_MAPPINGCHANNEL n` blocks add channel `n`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AseUvChannel {
    pub channel: u32,
    /// `2` for UV, `3` when any W coordinate is non-zero.
    pub components: u32,
    pub coords: AseAttribute,
}

/// One `*GEOMOBJECT`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AseMesh {
    pub name: String,
    /// Positions as listed, faces in file order. Normals are empty.
    pub mesh: SmoothingMesh,
    /// `*MESH_MTLID` per face, parallel to `mesh.faces`.
    pub face_material_ids: Vec<u32>,
    pub material_ref: Option<u32>,
    /// Node transform from `*NODE_TM`. Listed positions are already in world
    /// space.
    pub transform: Transform,
    /// Texture channels ordered by channel number.
    pub uv_channels: Vec<AseUvChannel>,
    pub colors: Option<AseAttribute>,
    /// `*MESH_VERTEXNORMAL` per face corner, parallel to `mesh.faces`. Empty
    /// when the object has no `*MESH_NORMALS` block.
    pub stored_normals: Vec<[Vec3; 3]>,
}

impl AseMesh {
    /// Copy where every face corner has its own position, texture coordinate
    /// and colour, all addressed by the same index.
    #[must_use]
    pub fn unjoined(&self) -> Self {
        Self {
            name: self.name.clone(),
            mesh: self.mesh.unjoined(),
            face_material_ids: self.face_material_ids.clone(),
            material_ref: self.material_ref,
            transform: self.transform,
            uv_channels: self
                .uv_channels
                .iter()
                .map(|uv| AseUvChannel {
                    channel: uv.channel,
                    components: uv.components,
                    coords: uv.coords.unjoined(),
                })
                .collect(),
            colors: self.colors.as_ref().map(AseAttribute::unjoined),
            stored_normals: self.stored_normals.clone(),
        }
    }

    /// Stored normals as `[nx, ny, nz, ...]`, three per face.
    #[must_use]
    pub fn stored_normals_flat(&self) -> Vec<f64> {
        self.stored_normals
            .iter()
            .flatten()
            .flat_map(|n| n.to_array())
            .collect()
    }
}

/// Parse an ASE document.
pub fn parse_str(input: &str) -> ParseResult<AseScene> {
    log::debug!("Start parsing ASE document ({} bytes)", input.len());
    let mut parser = Parser::new(input);
    let scene = parser.scene()?;
    log::debug!(
        "Found {} geometry object(s), {} material(s)",
        scene.meshes.len(),
        scene.material_count
    );
    Ok(scene)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'a> {
    text: &'a str,
    line: usize,
}

impl Token<'_> {
    fn is_keyword(&self) -> bool {
        self.text.starts_with('*')
    }

    fn is_brace(&self) -> bool {
        self.text == "{" || self.text == "}"
    }
}

/// Split into whitespace-separated words. Braces are always tokens of their own
/// and double-quoted strings (which may contain spaces) stay in one piece,
/// quotes included.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut line = 1;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\n' {
            line += 1;
            i += 1;
        } else if c.is_ascii_whitespace() {
            i += 1;
        } else if c == b'{' || c == b'}' {
            tokens.push(Token {
                text: &input[i..=i],
                line,
            });
            i += 1;
        } else if c == b'"' {
            let start = i;
            let start_line = line;
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                if bytes[i] == b'\n' {
                    line += 1;
                }
                i += 1;
            }
            i = (i + 1).min(bytes.len());
            tokens.push(Token {
                text: &input[start..i],
                line: start_line,
            });
        } else {
            let start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && bytes[i] != b'{'
                && bytes[i] != b'}'
            {
                i += 1;
            }
            tokens.push(Token {
                text: &input[start..i],
                line,
            });
        }
    }

    tokens
}

// ─────────────────────────────────────────────────────────────────────────────
// Mesh assembly
// ─────────────────────────────────────────────────────────────────────────────

/// Keywords of a separately indexed vertex channel.
struct ChannelKeywords {
    num_values: &'static str,
    value_list: &'static str,
    value: &'static str,
    num_faces: &'static str,
    face_list: &'static str,
    face: &'static str,
}

impl ChannelKeywords {
    fn handles(&self, keyword: &str) -> bool {
        [
            self.num_values,
            self.value_list,
            self.num_faces,
            self.face_list,
        ]
        .contains(&keyword)
    }
}

const TEXTURE: ChannelKeywords = ChannelKeywords {
    num_values: "*MESH_NUMTVERTEX",
    value_list: "*MESH_TVERTLIST",
    value: "*MESH_TVERT",
    num_faces: "*MESH_NUMTVFACES",
    face_list: "*MESH_TFACELIST",
    face: "*MESH_TFACE",
};

const COLOR: ChannelKeywords = ChannelKeywords {
    num_values: "*MESH_NUMCVERTEX",
    value_list: "*MESH_CVERTLIST",
    value: "*MESH_VERTCOL",
    num_faces: "*MESH_NUMCVFACES",
    face_list: "*MESH_CFACELIST",
    face: "*MESH_CFACE",
};

#[derive(Debug, Default)]
struct ChannelBuilder {
    values: Vec<[f64; 3]>,
    values_declared: bool,
    /// Indexed by face id.
    faces: Vec<Option<[u32; 3]>>,
}

impl ChannelBuilder {
    /// Keep the triples of the faces in `kept`; faces without one use index 0.
    fn finish(self, kept: &[usize], keyword: &str) -> AseAttribute {
        let mut missing = 0usize;
        let faces = kept
            .iter()
            .map(|&face| {
                self.faces.get(face).copied().flatten().unwrap_or_else(|| {
                    missing += 1;
                    [0; 3]
                })
            })
            .collect();
        if missing > 0 {
            log::warn!("{missing} face(s) without {keyword}; using index 0");
        }

        AseAttribute {
            values: self.values,
            faces,
        }
    }
}

#[derive(Debug, Default)]
struct MeshBuilder {
    positions: Vec<Point3>,
    vertices_declared: bool,
    /// Indexed by face id.
    faces: Vec<Option<(SmoothingFace, u32)>>,
    faces_declared: bool,
    uv_channels: Vec<(u32, ChannelBuilder)>,
    colors: Option<ChannelBuilder>,
    normals: Vec<Option<[Vec3; 3]>>,
}

impl MeshBuilder {
    fn uv_channel(&mut self, number: u32) -> &mut ChannelBuilder {
        let index = match self.uv_channels.iter().position(|(n, _)| *n == number) {
            Some(index) => index,
            None => {
                self.uv_channels.push((number, ChannelBuilder::default()));
                self.uv_channels.len() - 1
            }
        };
        &mut self.uv_channels[index].1
    }

    fn finish(self, object: &mut AseMesh) {
        let declared = self.faces.len();
        let kept: Vec<usize> = self
            .faces
            .iter()
            .enumerate()
            .filter_map(|(id, face)| face.is_some().then_some(id))
            .collect();
        let (faces, material_ids): (Vec<_>, Vec<_>) = self.faces.into_iter().flatten().unzip();
        if faces.len() < declared {
            log::warn!(
                "ASE mesh declares {declared} faces but lists {}; missing faces dropped",
                faces.len()
            );
        }

        let mut uv_channels: Vec<AseUvChannel> = self
            .uv_channels
            .into_iter()
            .filter(|(_, ch)| !ch.values.is_empty())
            .map(|(channel, ch)| {
                let coords = ch.finish(&kept, TEXTURE.face);
                let components = if coords.values.iter().any(|v| v[2].abs() > 0.0) {
                    3
                } else {
                    2
                };
                AseUvChannel {
                    channel,
                    components,
                    coords,
                }
            })
            .collect();
        uv_channels.sort_by_key(|uv| uv.channel);

        object.mesh = SmoothingMesh::new(self.positions, faces);
        object.face_material_ids = material_ids;
        object.uv_channels = uv_channels;
        object.colors = self
            .colors
            .filter(|ch| !ch.values.is_empty())
            .map(|ch| ch.finish(&kept, COLOR.face));
        object.stored_normals = if self.normals.iter().any(Option::is_some) {
            kept.iter()
                .map(|&face| self.normals.get(face).copied().flatten().unwrap_or_default())
                .collect()
        } else {
            Vec::new()
        };
    }
}

/// Store `value` at `index`, or warn and drop it when the list was declared
/// shorter.
fn store<T>(slots: &mut [T], index: usize, line: usize, keyword: &str, value: T) {
    let count = slots.len();
    match slots.get_mut(index) {
        Some(slot) => *slot = value,
        None => log::warn!("line {line}: {keyword} {index} beyond the declared {count}; skipped"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            tokens: tokenize(input),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map_or(1, |t| t.line)
    }

    fn expect_any(&mut self, expected: &'static str) -> ParseResult<Token<'a>> {
        self.next().ok_or(AseError::UnexpectedEof {
            line: self.last_line(),
            expected,
        })
    }

    fn expect_open(&mut self) -> ParseResult<()> {
        let token = self.expect_any("`{`")?;
        if token.text == "{" {
            Ok(())
        } else {
            Err(AseError::Unexpected {
                line: token.line,
                expected: "`{`",
                found: token.text.to_owned(),
            })
        }
    }

    fn expect_usize(&mut self, expected: &'static str) -> ParseResult<(usize, usize)> {
        let token = self.expect_any(expected)?;
        let text = token.text.trim_end_matches(':');
        let value = text.parse().map_err(|_| AseError::Number {
            line: token.line,
            text: token.text.to_owned(),
        })?;
        Ok((value, token.line))
    }

    fn expect_u32(&mut self, expected: &'static str) -> ParseResult<u32> {
        let token = self.expect_any(expected)?;
        token.text.parse().map_err(|_| AseError::Number {
            line: token.line,
            text: token.text.to_owned(),
        })
    }

    fn expect_f64(&mut self, expected: &'static str) -> ParseResult<f64> {
        let token = self.expect_any(expected)?;
        token.text.parse().map_err(|_| AseError::Number {
            line: token.line,
            text: token.text.to_owned(),
        })
    }

    /// Element count announced by `keyword`. Every listed element takes at
    /// least one token, so a count above the remaining token count is
    /// rejected before anything is allocated for it.
    fn declared_count(&mut self, keyword: &'static str) -> ParseResult<usize> {
        let (count, line) = self.expect_usize("element count")?;
        if count > self.tokens.len() - self.pos {
            return Err(AseError::DeclaredCount {
                line,
                keyword,
                count,
            });
        }
        Ok(count)
    }

    fn triple(&mut self) -> ParseResult<[f64; 3]> {
        Ok([
            self.expect_f64("x value")?,
            self.expect_f64("y value")?,
            self.expect_f64("z value")?,
        ])
    }

    /// `i x y z`, returning the index with its line.
    fn indexed_triple(&mut self) -> ParseResult<(usize, usize, [f64; 3])> {
        let (index, line) = self.expect_usize("element index")?;
        Ok((index, line, self.triple()?))
    }

    /// `f a b c` where `a`, `b` and `c` address one of `value_count` values.
    fn index_triple(&mut self, value_count: usize) -> ParseResult<(usize, usize, [u32; 3])> {
        let (face, line) = self.expect_usize("face index")?;
        let mut corners = [0u32; 3];
        for corner in &mut corners {
            let (index, index_line) = self.expect_usize("vertex index")?;
            if index >= value_count {
                return Err(AseError::VertexIndex {
                    line: index_line,
                    index,
                    count: value_count,
                });
            }
            *corner = index as u32;
        }
        Ok((face, line, corners))
    }

    /// Skip the remaining values of a keyword: everything up to the next
    /// keyword or brace. A block opened right after the keyword is skipped too.
    fn skip_values(&mut self) -> ParseResult<()> {
        while let Some(token) = self.peek() {
            if token.text == "{" {
                self.pos += 1;
                return self.skip_block();
            }
            if token.is_keyword() || token.is_brace() {
                break;
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Skip to the brace that closes an already opened block.
    fn skip_block(&mut self) -> ParseResult<()> {
        let mut depth = 1usize;
        while let Some(token) = self.next() {
            match token.text {
                "{" => depth += 1,
                "}" => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(AseError::UnexpectedEof {
            line: self.last_line(),
            expected: "`}`",
        })
    }

    /// Iterate over the keywords of an already opened block, calling `f` with
    /// each keyword. `f` consumes the keyword's values; returning `false` lets
    /// the generic skipping handle them.
    fn block<F>(&mut self, mut f: F) -> ParseResult<()>
    where
        F: FnMut(&mut Self, Token<'a>) -> ParseResult<bool>,
    {
        loop {
            let token = self.expect_any("`}`")?;
            if token.text == "}" {
                return Ok(());
            }
            if token.text == "{" {
                self.skip_block()?;
                continue;
            }
            if !f(self, token)? {
                self.skip_values()?;
            }
        }
    }

    fn scene(&mut self) -> ParseResult<AseScene> {
        let mut scene = AseScene::default();

        while let Some(token) = self.next() {
            match token.text {
                "*GEOMOBJECT" => {
                    self.expect_open()?;
                    let mesh = self.geom_object()?;
                    scene.meshes.push(mesh);
                }
                "*MATERIAL_LIST" => {
                    self.expect_open()?;
                    scene.material_count = self.material_list()?;
                }
                "{" => self.skip_block()?,
                "}" => return Err(AseError::UnbalancedBraces { line: token.line }),
                _ => self.skip_values()?,
            }
        }

        Ok(scene)
    }

    fn material_list(&mut self) -> ParseResult<usize> {
        let mut count = 0;
        self.block(|p, token| match token.text {
            "*MATERIAL_COUNT" => {
                count = p.expect_usize("material count")?.0;
                Ok(true)
            }
            _ => Ok(false),
        })?;
        Ok(count)
    }

    fn geom_object(&mut self) -> ParseResult<AseMesh> {
        let mut object = AseMesh::default();
        self.block(|p, token| match token.text {
            "*NODE_NAME" => {
                let name = p.expect_any("node name")?;
                object.name = name.text.trim_matches('"').to_owned();
                Ok(true)
            }
            "*NODE_TM" => {
                p.expect_open()?;
                object.transform = p.node_transform()?;
                Ok(true)
            }
            "*MATERIAL_REF" => {
                object.material_ref = Some(p.expect_u32("material index")?);
                Ok(true)
            }
            "*MESH" => {
                p.expect_open()?;
                p.mesh(&mut object)?;
                Ok(true)
            }
            _ => Ok(false),
        })?;

        if object.name.is_empty() {
            log::warn!("ASE geometry object without *NODE_NAME");
        }
        Ok(object)
    }

    /// `*TM_ROW0..2` are the images of the unit axes, `*TM_ROW3` the
    /// translation. Missing rows keep their identity value.
    fn node_transform(&mut self) -> ParseResult<Transform> {
        let mut rows = [Vec3::X, Vec3::Y, Vec3::Z, Vec3::ZERO];
        self.block(|p, token| {
            let row = match token.text {
                "*TM_ROW0" => 0,
                "*TM_ROW1" => 1,
                "*TM_ROW2" => 2,
                "*TM_ROW3" => 3,
                _ => return Ok(false),
            };
            rows[row] = Vec3::from_array(p.triple()?);
            Ok(true)
        })?;

        let [x_axis, y_axis, z_axis, origin] = rows;
        Ok(Transform::from_axes(
            Point3::from_array(origin.to_array()),
            x_axis,
            y_axis,
            z_axis,
        ))
    }

    fn mesh(&mut self, object: &mut AseMesh) -> ParseResult<()> {
        let mut m = MeshBuilder::default();

        self.block(|p, token| match token.text {
            "*MESH_NUMVERTEX" => {
                let count = p.declared_count("*MESH_NUMVERTEX")?;
                if m.vertices_declared {
                    log::warn!("line {}: repeated *MESH_NUMVERTEX ignored", token.line);
                } else {
                    m.positions = vec![Point3::ORIGIN; count];
                    m.vertices_declared = true;
                }
                Ok(true)
            }
            "*MESH_NUMFACES" => {
                let count = p.declared_count("*MESH_NUMFACES")?;
                if m.faces_declared {
                    log::warn!("line {}: repeated *MESH_NUMFACES ignored", token.line);
                } else {
                    m.faces = vec![None; count];
                    m.faces_declared = true;
                }
                Ok(true)
            }
            "*MESH_VERTEX_LIST" => {
                p.expect_open()?;
                p.block(|p, token| match token.text {
                    "*MESH_VERTEX" => {
                        let (index, line, xyz) = p.indexed_triple()?;
                        let position = Point3::from_array(xyz);
                        store(&mut m.positions, index, line, "*MESH_VERTEX", position);
                        Ok(true)
                    }
                    _ => Ok(false),
                })?;
                Ok(true)
            }
            "*MESH_FACE_LIST" => {
                p.expect_open()?;
                p.block(|p, token| match token.text {
                    "*MESH_FACE" => {
                        p.face(m.positions.len(), &mut m.faces)?;
                        Ok(true)
                    }
                    _ => Ok(false),
                })?;
                Ok(true)
            }
            "*MESH_MAPPINGCHANNEL" => {
                let number = p.expect_u32("mapping channel")?;
                p.expect_open()?;
                let face_count = m.faces.len();
                let channel = m.uv_channel(number);
                p.block(|p, token| p.channel_entry(token, &TEXTURE, channel, face_count))?;
                Ok(true)
            }
            "*MESH_NORMALS" => {
                p.expect_open()?;
                m.normals.resize(m.faces.len(), None);
                p.normals(&mut m.normals)?;
                Ok(true)
            }
            keyword if TEXTURE.handles(keyword) => {
                let face_count = m.faces.len();
                p.channel_entry(token, &TEXTURE, m.uv_channel(1), face_count)
            }
            keyword if COLOR.handles(keyword) => {
                let face_count = m.faces.len();
                let colors = m.colors.get_or_insert_with(ChannelBuilder::default);
                p.channel_entry(token, &COLOR, colors, face_count)
            }
            _ => Ok(false),
        })?;

        m.finish(object);
        Ok(())
    }

    /// One keyword of a texture or colour channel.
    fn channel_entry(
        &mut self,
        token: Token<'a>,
        keys: &ChannelKeywords,
        channel: &mut ChannelBuilder,
        face_count: usize,
    ) -> ParseResult<bool> {
        let keyword = token.text;
        if keyword == keys.num_values {
            let count = self.declared_count(keys.num_values)?;
            if channel.values_declared {
                log::warn!("line {}: repeated {keyword} ignored", token.line);
            } else {
                channel.values = vec![[0.0; 3]; count];
                channel.values_declared = true;
            }
        } else if keyword == keys.value_list {
            self.expect_open()?;
            let values = &mut channel.values;
            self.block(|p, token| {
                if token.text != keys.value {
                    return Ok(false);
                }
                let (index, line, value) = p.indexed_triple()?;
                store(values, index, line, keys.value, value);
                Ok(true)
            })?;
        } else if keyword == keys.num_faces {
            let count = self.declared_count(keys.num_faces)?;
            if count != face_count {
                log::warn!(
                    "line {}: {keyword} {count} differs from {face_count} mesh faces",
                    token.line
                );
            }
        } else if keyword == keys.face_list {
            self.expect_open()?;
            if channel.faces.len() < face_count {
                channel.faces.resize(face_count, None);
            }
            let value_count = channel.values.len();
            let faces = &mut channel.faces;
            self.block(|p, token| {
                if token.text != keys.face {
                    return Ok(false);
                }
                let (face, line, corners) = p.index_triple(value_count)?;
                store(faces, face, line, keys.face, Some(corners));
                Ok(true)
            })?;
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    /// `*MESH_FACENORMAL f x y z` followed by up to three
    /// `*MESH_VERTEXNORMAL v x y z`, assigned to corners A, B and C in order.
    fn normals(&mut self, normals: &mut [Option<[Vec3; 3]>]) -> ParseResult<()> {
        let mut current: Option<(usize, usize)> = None;
        self.block(|p, token| match token.text {
            "*MESH_FACENORMAL" => {
                let (face, line, _) = p.indexed_triple()?;
                current = match normals.get_mut(face) {
                    Some(slot) => {
                        if slot.is_none() {
                            *slot = Some([Vec3::ZERO; 3]);
                        }
                        Some((face, 0))
                    }
                    None => {
                        log::warn!("line {line}: *MESH_FACENORMAL {face} has no face; skipped");
                        None
                    }
                };
                Ok(true)
            }
            "*MESH_VERTEXNORMAL" => {
                let (_, line, n) = p.indexed_triple()?;
                match current.as_mut() {
                    Some((face, corner)) if *corner < 3 => {
                        if let Some(Some(corners)) = normals.get_mut(*face) {
                            corners[*corner] = Vec3::from_array(n);
                        }
                        *corner += 1;
                    }
                    _ => log::warn!("line {line}: stray *MESH_VERTEXNORMAL skipped"),
                }
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    /// `*MESH_FACE i: A: a B: b C: c [AB: e BC: e CA: e] [*MESH_SMOOTHING g,g] [*MESH_MTLID m]`
    fn face(
        &mut self,
        vertex_count: usize,
        faces: &mut [Option<(SmoothingFace, u32)>],
    ) -> ParseResult<()> {
        let (index, line) = self.expect_usize("face index")?;
        let mut corners = [None; 3];

        while let Some(token) = self.peek() {
            if token.is_keyword() || token.is_brace() {
                break;
            }
            self.pos += 1;

            let (label, inline) = token.text.split_once(':').unwrap_or((token.text, ""));
            let slot = match label {
                "A" => 0,
                "B" => 1,
                "C" => 2,
                // edge visibility flags
                "AB" | "BC" | "CA" => {
                    if inline.is_empty() {
                        self.next();
                    }
                    continue;
                }
                _ => {
                    return Err(AseError::Unexpected {
                        line: token.line,
                        expected: "face corner label",
                        found: token.text.to_owned(),
                    });
                }
            };

            let (value, value_line) = if inline.is_empty() {
                self.expect_usize("vertex index")?
            } else {
                let value = inline.parse().map_err(|_| AseError::Number {
                    line: token.line,
                    text: token.text.to_owned(),
                })?;
                (value, token.line)
            };
            if value >= vertex_count {
                return Err(AseError::VertexIndex {
                    line: value_line,
                    index: value,
                    count: vertex_count,
                });
            }
            corners[slot] = Some(value as u32);
        }

        let [Some(a), Some(b), Some(c)] = corners else {
            return Err(AseError::Unexpected {
                line,
                expected: "corners A, B and C",
                found: format!("*MESH_FACE {index}"),
            });
        };

        let mut smoothing_group = 0u32;
        let mut material_id = 0u32;
        loop {
            match self.peek().map(|t| t.text) {
                Some("*MESH_SMOOTHING") => {
                    self.pos += 1;
                    smoothing_group = self.smoothing_list()?;
                }
                Some("*MESH_MTLID") => {
                    self.pos += 1;
                    material_id = self.expect_u32("material id")?;
                }
                _ => break,
            }
        }

        store(
            faces,
            index,
            line,
            "*MESH_FACE",
            Some((SmoothingFace::new([a, b, c], smoothing_group), material_id)),
        );
        Ok(())
    }

    /// Comma separated group numbers, possibly split over several words or
    /// empty. Group `g` sets bit `1 << g`.
    fn smoothing_list(&mut self) -> ParseResult<u32> {
        let mut mask = 0u32;
        while let Some(token) = self.peek() {
            if token.is_keyword() || token.is_brace() {
                break;
            }
            self.pos += 1;

            for part in token.text.split(',').filter(|s| !s.is_empty()) {
                let group: u32 = part.parse().map_err(|_| AseError::Number {
                    line: token.line,
                    text: token.text.to_owned(),
                })?;
                if group < 32 {
                    mask |= 1 << group;
                } else {
                    log::warn!(
                        "line {}: smoothing group {group} exceeds 31 and is ignored",
                        token.line
                    );
                }
            }
        }
        Ok(mask)
    }
}
