#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod parse;

use std::fmt;

use geom::{
    SmoothingDiagnostics, SmoothingMesh, SmoothingOptions, SmoothingRule,
    compute_smoothing_normals_batch, compute_smoothing_normals_with_options,
};
use parse::{AseAttribute, AseScene, AseUvChannel};
use serde::Serialize;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("kon rayon threadpool niet initialiseren: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

#[derive(Debug, Serialize)]
struct AttributeExport {
    values: Vec<f64>,
    indices: Vec<u32>,
}

impl From<&AseAttribute> for AttributeExport {
    fn from(attribute: &AseAttribute) -> Self {
        Self {
            values: attribute.values_flat(),
            indices: attribute.indices_flat(),
        }
    }
}

#[derive(Debug, Serialize)]
struct UvChannelExport {
    channel: u32,
    components: u32,
    values: Vec<f64>,
    indices: Vec<u32>,
}

impl From<&AseUvChannel> for UvChannelExport {
    fn from(uv: &AseUvChannel) -> Self {
        Self {
            channel: uv.channel,
            components: uv.components,
            values: uv.coords.values_flat(),
            indices: uv.coords.indices_flat(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MeshExport<'a> {
    name: &'a str,
    positions: Vec<f64>,
    indices: Vec<u32>,
    smoothing_groups: Vec<u32>,
    material_ids: &'a [u32],
    normals: Vec<f64>,
    /// Rij-major 4x4 node-transformatie.
    transform: [[f64; 4]; 4],
    uv_channels: Vec<UvChannelExport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    colors: Option<AttributeExport>,
    /// Normalen uit het bestand, drie per face; leeg als het bestand er geen heeft.
    stored_normals: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a SmoothingDiagnostics>,
}

/// Public entry point for consumers.
#[wasm_bindgen]
pub struct Engine {
    initialized: bool,
    options: SmoothingOptions,
    unjoin: bool,
    scene: Option<AseScene>,
    diagnostics: Vec<SmoothingDiagnostics>,
    normals_dirty: bool,
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Engine {
        Engine {
            initialized: true,
            options: SmoothingOptions::default(),
            unjoin: true,
            scene: None,
            diagnostics: Vec::new(),
            normals_dirty: false,
        }
    }

    /// Geeft terug of de engine de minimale initialisatie heeft doorlopen.
    #[wasm_bindgen]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Kies de smoothing-groepregel: `"shared-bit"` of `"ungrouped-all"`.
    #[wasm_bindgen]
    pub fn set_rule(&mut self, name: &str) -> Result<(), JsValue> {
        let rule = SmoothingRule::from_name(name)
            .ok_or_else(|| js_error(&format!("onbekende smoothing-regel: {name}")))?;
        if rule != self.options.rule {
            self.options.rule = rule;
            self.normals_dirty = self.scene.is_some();
        }
        Ok(())
    }

    /// Geef elke hoek van een face een eigen positie bij het laden (standaard aan).
    ///
    /// Geldt voor het volgende `load_ase`.
    #[wasm_bindgen]
    pub fn set_unjoin(&mut self, unjoin: bool) {
        self.unjoin = unjoin;
    }

    /// Laad een ASE-bestand. Eerder berekende normalen vervallen.
    #[wasm_bindgen]
    pub fn load_ase(&mut self, text: &str) -> Result<(), JsValue> {
        let mut scene = parse::parse_str(text).map_err(to_js_error)?;
        if self.unjoin {
            for object in &mut scene.meshes {
                *object = object.unjoined();
            }
        }

        debug_log!("ASE geladen: {} mesh(es)", scene.meshes.len());
        self.scene = Some(scene);
        self.diagnostics.clear();
        self.normals_dirty = true;
        Ok(())
    }

    /// Bereken normalen voor alle geladen meshes.
    #[wasm_bindgen]
    pub fn compute_normals(&mut self) -> Result<(), JsValue> {
        let scene = self
            .scene
            .as_mut()
            .ok_or_else(|| js_error("er is geen ASE-bestand geladen"))?;
        if !self.normals_dirty {
            return Ok(());
        }

        // Alles valideren voordat er normalen geschreven worden.
        for object in &scene.meshes {
            object
                .mesh
                .validate()
                .map_err(|err| js_error(&format!("mesh '{}': {err}", object.name)))?;
        }

        let mut meshes: Vec<SmoothingMesh> = scene
            .meshes
            .iter_mut()
            .map(|object| std::mem::take(&mut object.mesh))
            .collect();
        let results = compute_smoothing_normals_batch(&mut meshes, &self.options);
        for (object, mesh) in scene.meshes.iter_mut().zip(meshes) {
            object.mesh = mesh;
        }

        self.diagnostics = results
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(to_js_error)?;
        self.normals_dirty = false;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn mesh_count(&self) -> usize {
        self.scene.as_ref().map_or(0, |scene| scene.meshes.len())
    }

    /// Haal alle meshes op als platte buffers, met normalen zodra ze berekend zijn.
    #[wasm_bindgen]
    pub fn get_meshes(&self) -> Result<JsValue, JsValue> {
        let exports = self.mesh_exports()?;
        serde_wasm_bindgen::to_value(&exports).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Samenvatting van de laatste normaalberekening over alle meshes.
    #[wasm_bindgen]
    pub fn get_diagnostics(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.merged_diagnostics())
            .map_err(|err| JsError::new(&err.to_string()).into())
    }
}

impl Engine {
    fn mesh_exports(&self) -> Result<Vec<MeshExport<'_>>, JsValue> {
        let scene = self
            .scene
            .as_ref()
            .ok_or_else(|| js_error("er is geen ASE-bestand geladen"))?;

        Ok(scene
            .meshes
            .iter()
            .enumerate()
            .map(|(index, object)| MeshExport {
                name: &object.name,
                positions: object.mesh.positions_flat(),
                indices: object.mesh.indices_flat(),
                smoothing_groups: object.mesh.smoothing_groups(),
                material_ids: &object.face_material_ids,
                normals: object.mesh.normals_flat(),
                transform: *object.transform.as_matrix(),
                uv_channels: object.uv_channels.iter().map(UvChannelExport::from).collect(),
                colors: object.colors.as_ref().map(AttributeExport::from),
                stored_normals: object.stored_normals_flat(),
                diagnostics: self.diagnostics.get(index),
            })
            .collect())
    }

    fn merged_diagnostics(&self) -> SmoothingDiagnostics {
        self.diagnostics
            .iter()
            .fold(SmoothingDiagnostics::new(), |mut acc, diag| {
                acc.merge(diag);
                acc
            })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Bereken normalen voor platte buffers: `positions` als `[x, y, z, ...]`,
/// `indices` als driehoekslijst en één smoothing-masker per driehoek.
///
/// Geeft `[nx, ny, nz, ...]` terug, één normaal per positie.
#[wasm_bindgen]
pub fn smoothing_normals(
    positions: &[f64],
    indices: &[u32],
    smoothing_groups: &[u32],
) -> Result<Vec<f64>, JsValue> {
    let mut mesh =
        SmoothingMesh::from_flat(positions, indices, smoothing_groups).map_err(to_js_error)?;
    compute_smoothing_normals_with_options(&mut mesh, &SmoothingOptions::default())
        .map_err(to_js_error)?;
    Ok(mesh.normals_flat())
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        log::warn!("{message}");
        JsValue::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, smoothing_normals};
    use crate::geom::SmoothingDiagnostics;

    const FOLD: &str = "*GEOMOBJECT {
        *NODE_NAME \"Fold\"
        *MESH {
            *MESH_NUMVERTEX 4
            *MESH_NUMFACES 2
            *MESH_VERTEX_LIST {
                *MESH_VERTEX 0 0.0 0.0 0.0
                *MESH_VERTEX 1 1.0 0.0 0.0
                *MESH_VERTEX 2 0.0 1.0 0.0
                *MESH_VERTEX 3 0.0 0.0 1.0
            }
            *MESH_FACE_LIST {
                *MESH_FACE 0: A: 0 B: 1 C: 2 *MESH_SMOOTHING 1 *MESH_MTLID 0
                *MESH_FACE 1: A: 0 B: 3 C: 1 *MESH_SMOOTHING 1 *MESH_MTLID 0
            }
        }
    }";

    #[test]
    fn flat_buffer_entry_point() {
        let normals = smoothing_normals(
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            &[0, 1, 2, 0, 2, 3],
            &[1, 1],
        )
        .unwrap();
        assert_eq!(normals.len(), 12);
        for normal in normals.chunks_exact(3) {
            assert_eq!(normal, [0.0, 0.0, 1.0]);
        }

        assert!(smoothing_normals(&[0.0; 9], &[0, 1, 5], &[1]).is_err());
        assert!(smoothing_normals(&[0.0; 9], &[0, 1, 2], &[1, 2]).is_err());
    }

    #[test]
    fn engine_loads_and_smooths_ase() {
        let mut engine = Engine::new();
        assert!(engine.is_initialized());
        assert!(engine.compute_normals().is_err());

        engine.load_ase(FOLD).unwrap();
        assert_eq!(engine.mesh_count(), 1);
        engine.compute_normals().unwrap();

        let exports = engine.mesh_exports().unwrap();
        assert_eq!(exports[0].name, "Fold");
        // unjoined on load: one position per corner
        assert_eq!(exports[0].positions.len(), 18);
        assert_eq!(exports[0].normals.len(), 18);
        let hinge = std::f64::consts::FRAC_1_SQRT_2;
        assert!((exports[0].normals[1] - hinge).abs() < 1e-12);
        assert!((exports[0].normals[2] - hinge).abs() < 1e-12);

        let merged = engine.merged_diagnostics();
        assert_eq!(merged.face_count, 2);
        assert!(merged.is_clean());
    }

    #[test]
    fn engine_keeps_shared_positions_when_asked() {
        let mut engine = Engine::new();
        engine.set_unjoin(false);
        engine.load_ase(FOLD).unwrap();
        engine.compute_normals().unwrap();

        let exports = engine.mesh_exports().unwrap();
        assert_eq!(exports[0].positions.len(), 12);
        // shared hinge keeps the scratch normal of the last face: +Y
        assert_eq!(&exports[0].normals[0..3], &[0.0, 1.0, 0.0]);
    }

    const PAINTED: &str = "*GEOMOBJECT {
        *NODE_NAME \"Painted\"
        *NODE_TM { *TM_ROW0 1 0 0 *TM_ROW1 0 1 0 *TM_ROW2 0 0 1 *TM_ROW3 0 0 3 }
        *MESH {
            *MESH_NUMVERTEX 3
            *MESH_NUMFACES 1
            *MESH_VERTEX_LIST {
                *MESH_VERTEX 0 0.0 0.0 0.0
                *MESH_VERTEX 1 1.0 0.0 0.0
                *MESH_VERTEX 2 0.0 1.0 0.0
            }
            *MESH_FACE_LIST { *MESH_FACE 0: A: 0 B: 1 C: 2 *MESH_SMOOTHING 1 }
            *MESH_NUMTVERTEX 2
            *MESH_TVERTLIST { *MESH_TVERT 0 0.0 0.0 0.0 *MESH_TVERT 1 1.0 0.5 0.0 }
            *MESH_NUMTVFACES 1
            *MESH_TFACELIST { *MESH_TFACE 0 1 0 1 }
            *MESH_NUMCVERTEX 1
            *MESH_CVERTLIST { *MESH_VERTCOL 0 0.2 0.4 0.6 }
            *MESH_NUMCVFACES 1
            *MESH_CFACELIST { *MESH_CFACE 0 0 0 0 }
            *MESH_NORMALS {
                *MESH_FACENORMAL 0 0 0 1
                *MESH_VERTEXNORMAL 0 0 0 1
                *MESH_VERTEXNORMAL 1 0 0 1
                *MESH_VERTEXNORMAL 2 0 0 1
            }
        }
    }";

    #[test]
    fn engine_exports_per_corner_attributes() {
        let mut engine = Engine::new();
        engine.load_ase(PAINTED).unwrap();
        engine.compute_normals().unwrap();

        let exports = engine.mesh_exports().unwrap();
        let mesh = &exports[0];
        assert_eq!(mesh.transform[2][3], 3.0);

        assert_eq!(mesh.uv_channels.len(), 1);
        let uv = &mesh.uv_channels[0];
        assert_eq!((uv.channel, uv.components), (1, 2));
        // corner-aligned with the positions after unjoining
        assert_eq!(uv.indices, mesh.indices);
        assert_eq!(uv.values, vec![1.0, 0.5, 0.0, 0.0, 0.0, 0.0, 1.0, 0.5, 0.0]);

        let colors = mesh.colors.as_ref().unwrap();
        assert_eq!(colors.values.len(), 9);
        assert_eq!(&colors.values[6..9], &[0.2, 0.4, 0.6]);

        assert_eq!(mesh.stored_normals.len(), 9);
        assert_eq!(&mesh.stored_normals[0..3], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn failed_compute_writes_no_normals() {
        let mut engine = Engine::new();
        engine.load_ase(FOLD).unwrap();
        engine.compute_normals().unwrap();
        let previous: Vec<SmoothingDiagnostics> = engine.diagnostics.clone();

        let scene = engine.scene.as_mut().unwrap();
        let mut broken = scene.meshes[0].clone();
        broken.name = "Broken".to_owned();
        broken.mesh.faces[0].indices[2] = 99;
        scene.meshes[0].mesh.normals.clear();
        scene.meshes.push(broken);
        engine.normals_dirty = true;

        assert!(engine.compute_normals().is_err());
        let scene = engine.scene.as_ref().unwrap();
        assert!(scene.meshes[0].mesh.normals.is_empty());
        assert_eq!(engine.diagnostics, previous);
        assert!(engine.normals_dirty);
    }

    #[test]
    fn engine_rejects_bad_input() {
        let mut engine = Engine::new();
        assert!(engine.load_ase("*GEOMOBJECT {").is_err());
        assert!(engine.set_rule("bogus").is_err());
        assert!(engine.set_rule("ungrouped-all").is_ok());
        assert_eq!(engine.mesh_count(), 0);
    }
}
