#[cfg(target_arch = "wasm32")]
fn main() {
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("mesh_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use sg_engine::geom::{
        Point3, SmoothingDiagnostics, SmoothingFace, SmoothingMesh, SmoothingOptions,
        SmoothingRule, Vec3, compute_smoothing_normals_with_options,
    };
    use sg_engine::parse;
    use std::fmt::Write as _;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;

    const USAGE: &str = r#"mesh_cli (sg-engine)

USAGE:
  mesh_cli list
  mesh_cli run <scenario|all> [options]
  mesh_cli ase <file.ase> [options]

SCENARIOS:
  square_shared_group
  square_split_groups
  cube_hard_edges
  cube_smooth
  degenerate_sliver

OPTIONS:
  --out-dir <dir>    Write <scenario>.obj and/or <scenario>.snap to this dir (run only, required for `all`)
  --obj <path>       Write OBJ with vertex normals
  --snap <path>      Write golden-style snapshot (default: print to stdout)
  --no-obj           Skip OBJ when using --out-dir
  --no-snap          Skip snapshot when using --out-dir
  --rule <name>      Smoothing-group rule: shared-bit (default) or ungrouped-all
  --keep-shared      (ase) Smooth the stored vertices instead of one vertex per face corner
  --overwrite        Overwrite existing output files
  -h, --help         Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_scenarios();
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "ase" => cmd_ase(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_scenarios() {
        for scenario in Scenario::ALL {
            println!("{}", scenario.name());
        }
    }

    #[derive(Debug, Default)]
    struct OutputOptions {
        out_dir: Option<PathBuf>,
        obj_path: Option<PathBuf>,
        snap_path: Option<PathBuf>,
        overwrite: bool,
        skip_obj: bool,
        skip_snap: bool,
        keep_shared: bool,
        rule: SmoothingRule,
    }

    impl OutputOptions {
        /// Returns `Ok(None)` when help was requested.
        fn parse(args: &mut Args) -> Result<Option<Self>, String> {
            let mut opts = Self::default();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--out-dir" => opts.out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                    "--obj" => opts.obj_path = Some(PathBuf::from(args.value("--obj")?)),
                    "--snap" => opts.snap_path = Some(PathBuf::from(args.value("--snap")?)),
                    "--overwrite" => opts.overwrite = true,
                    "--no-obj" => opts.skip_obj = true,
                    "--no-snap" => opts.skip_snap = true,
                    "--keep-shared" => opts.keep_shared = true,
                    "--rule" => {
                        let name = args.value("--rule")?;
                        opts.rule = SmoothingRule::from_name(&name)
                            .ok_or_else(|| format!("unknown rule `{name}` (shared-bit, ungrouped-all)"))?;
                    }
                    "-h" | "--help" => {
                        print_usage();
                        return Ok(None);
                    }
                    other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
                }
            }
            Ok(Some(opts))
        }

        fn smoothing_options(&self) -> SmoothingOptions {
            SmoothingOptions::default().with_rule(self.rule)
        }
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;
        let Some(opts) = OutputOptions::parse(args)? else {
            return Ok(());
        };

        if let Some(dir) = opts.out_dir.as_ref() {
            if opts.obj_path.is_some() || opts.snap_path.is_some() {
                return Err("use either --out-dir or --obj/--snap (not both)".to_string());
            }
            if opts.skip_obj && opts.skip_snap {
                return Err("nothing to write (both --no-obj and --no-snap set)".to_string());
            }

            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            if scenario_name == "all" {
                for scenario in Scenario::ALL {
                    run_one_scenario_to_dir(*scenario, dir, &opts)?;
                }
                return Ok(());
            }

            let scenario = Scenario::from_str(scenario_name.as_str())
                .ok_or_else(|| unknown_scenario(&scenario_name))?;
            return run_one_scenario_to_dir(scenario, dir, &opts);
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario =
            Scenario::from_str(scenario_name.as_str()).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario, &opts.smoothing_options())?;

        if let Some(path) = opts.snap_path.as_deref() {
            write_text_file(path, &output.snapshot, opts.overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", output.snapshot);
        }

        if let Some(path) = opts.obj_path.as_deref() {
            write_obj_file(path, &[(output.name, &output.mesh)], opts.overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        report(output.name, &output.mesh, &output.diag);
        Ok(())
    }

    fn run_one_scenario_to_dir(scenario: Scenario, dir: &Path, opts: &OutputOptions) -> Result<(), String> {
        let output = run_scenario(scenario, &opts.smoothing_options())?;

        if !opts.skip_snap {
            let path = dir.join(format!("{}.snap", output.name));
            write_text_file(&path, &output.snapshot, opts.overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        if !opts.skip_obj {
            let path = dir.join(format!("{}.obj", output.name));
            write_obj_file(&path, &[(output.name, &output.mesh)], opts.overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        report(output.name, &output.mesh, &output.diag);
        Ok(())
    }

    fn cmd_ase(args: &mut Args) -> Result<(), String> {
        let path = PathBuf::from(args.next().ok_or("missing ASE file path")?);
        let Some(opts) = OutputOptions::parse(args)? else {
            return Ok(());
        };
        if opts.out_dir.is_some() {
            return Err("--out-dir is only supported by `run`; use --obj/--snap".to_string());
        }

        let text = fs::read_to_string(&path).map_err(|e| format!("read {}: {e}", path.display()))?;
        let mut scene = parse::parse_str(&text).map_err(|e| format!("{}: {e}", path.display()))?;
        let options = opts.smoothing_options();

        let mut snap = snapshot_header(&format!("ase {}", file_label(&path)), opts.rule);
        let _ = writeln!(snap, "scene.material_count {}", scene.material_count);
        let _ = writeln!(snap, "scene.objects {}", scene.meshes.len());

        for object in &mut scene.meshes {
            if !opts.keep_shared {
                *object = object.unjoined();
            }
            let diag = compute_smoothing_normals_with_options(&mut object.mesh, &options)
                .map_err(|e| format!("object `{}`: {e}", object.name))?;

            let _ = writeln!(snap, "object {}", object.name);
            let _ = writeln!(
                snap,
                "attributes uv_channels={} colors={} stored_normals={}",
                object.uv_channels.len(),
                object.colors.is_some(),
                object.stored_normals.len()
            );
            write_diagnostics(&mut snap, &diag);
            write_mesh(&mut snap, &object.mesh);
            report(&object.name, &object.mesh, &diag);
        }
        let snap = normalize_snapshot_text(&snap);

        if let Some(path) = opts.snap_path.as_deref() {
            write_text_file(path, &snap, opts.overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{snap}");
        }

        if let Some(path) = opts.obj_path.as_deref() {
            let objects: Vec<(&str, &SmoothingMesh)> = scene
                .meshes
                .iter()
                .map(|object| (object.name.as_str(), &object.mesh))
                .collect();
            write_obj_file(path, &objects, opts.overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        Ok(())
    }

    fn file_label(path: &Path) -> String {
        path.file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
    }

    fn report(name: &str, mesh: &SmoothingMesh, diag: &SmoothingDiagnostics) {
        eprintln!(
            "{}: vertices={} triangles={} | {}",
            name,
            mesh.vertex_count(),
            mesh.face_count(),
            diag.summary()
        );
        for warning in &diag.warnings {
            eprintln!("  warning: {warning}");
        }
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = String::new();
        msg.push_str(&format!("unknown scenario `{name}`\n\navailable scenarios:\n"));
        for scenario in Scenario::ALL {
            msg.push_str(&format!("  {}\n", scenario.name()));
        }
        msg
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        fs::write(path, normalize_snapshot_text(text)).map_err(|e| format!("write {}: {e}", path.display()))
    }

    fn write_obj_file(path: &Path, objects: &[(&str, &SmoothingMesh)], overwrite: bool) -> Result<(), String> {
        for (name, mesh) in objects {
            mesh.validate()
                .map_err(|e| format!("mesh `{name}` validation failed: {e}"))?;
        }

        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);

        writeln!(w, "# sg-engine mesh_cli").map_err(|e| format!("write obj: {e}"))?;

        // OBJ indices are global and 1-based.
        let mut offset = 1u32;
        for (name, mesh) in objects {
            writeln!(w, "o {name}").map_err(|e| format!("write obj: {e}"))?;

            for p in &mesh.positions {
                writeln!(w, "v {} {} {}", p.x, p.y, p.z).map_err(|e| format!("write obj: {e}"))?;
            }

            let has_normals = mesh.has_normals();
            if has_normals {
                for n in &mesh.normals {
                    writeln!(w, "vn {} {} {}", n.x, n.y, n.z).map_err(|e| format!("write obj: {e}"))?;
                }
            }

            let mut current_group = None;
            for face in &mesh.faces {
                if current_group != Some(face.smoothing_group) {
                    current_group = Some(face.smoothing_group);
                    let group = if face.smoothing_group == 0 {
                        "off".to_string()
                    } else {
                        face.smoothing_group.to_string()
                    };
                    writeln!(w, "s {group}").map_err(|e| format!("write obj: {e}"))?;
                }

                let [a, b, c] = face.indices.map(|i| i + offset);
                if has_normals {
                    writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}")
                } else {
                    writeln!(w, "f {a} {b} {c}")
                }
                .map_err(|e| format!("write obj: {e}"))?;
            }

            offset += mesh.vertex_count() as u32;
        }

        w.flush().map_err(|e| format!("flush {}: {e}", path.display()))
    }

    fn normalize_snapshot_text(text: &str) -> String {
        let normalized = text.replace("\r\n", "\n");
        if normalized.ends_with('\n') {
            normalized
        } else {
            format!("{normalized}\n")
        }
    }

    fn quantize_f64(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let value = if value == -0.0 { 0.0 } else { value };
        let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
        if q == -0.0 { 0.0 } else { q }
    }

    fn write_f64(out: &mut String, value: f64) {
        let value = quantize_f64(value);
        let _ = write!(out, "{value:.SNAPSHOT_DECIMALS$}");
    }

    fn write_vec3_line(out: &mut String, prefix: &str, v: [f64; 3]) {
        let _ = write!(out, "{prefix} ");
        write_f64(out, v[0]);
        out.push(' ');
        write_f64(out, v[1]);
        out.push(' ');
        write_f64(out, v[2]);
        out.push('\n');
    }

    fn write_diagnostics(out: &mut String, diag: &SmoothingDiagnostics) {
        let _ = writeln!(out, "diag.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "diag.face_count {}", diag.face_count);
        let _ = writeln!(out, "diag.corner_entry_count {}", diag.corner_entry_count);
        // epsilon is far below the quantization step
        let _ = writeln!(out, "diag.epsilon {:.6e}", diag.epsilon);
        let _ = writeln!(out, "diag.degenerate_face_count {}", diag.degenerate_face_count);
        let _ = writeln!(out, "diag.zero_normal_count {}", diag.zero_normal_count);
        let _ = writeln!(
            out,
            "diag.unreferenced_vertex_count {}",
            diag.unreferenced_vertex_count
        );
        let _ = writeln!(out, "diag.max_matches_per_corner {}", diag.max_matches_per_corner);
        let _ = writeln!(out, "diag.warnings {}", diag.warnings.len());
    }

    fn write_mesh(out: &mut String, mesh: &SmoothingMesh) {
        let _ = writeln!(out, "mesh.positions {}", mesh.positions.len());
        for p in &mesh.positions {
            write_vec3_line(out, "p", p.to_array());
        }

        let _ = writeln!(out, "mesh.faces {}", mesh.faces.len());
        for face in &mesh.faces {
            let [a, b, c] = face.indices;
            let _ = writeln!(out, "f {a} {b} {c} sg {:#x}", face.smoothing_group);
        }

        if mesh.normals.is_empty() {
            let _ = writeln!(out, "mesh.normals none");
        } else {
            let _ = writeln!(out, "mesh.normals {}", mesh.normals.len());
            for n in &mesh.normals {
                write_vec3_line(out, "n", n.to_array());
            }
        }
    }

    fn snapshot_header(op: &str, rule: SmoothingRule) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# sg-engine golden v1");
        let _ = writeln!(out, "op {op}");
        let _ = writeln!(out, "quantize {SNAPSHOT_QUANTIZE:.1e}");
        let _ = writeln!(out, "rule {}", rule.name());
        out
    }

    fn snapshot(op: &str, rule: SmoothingRule, sections: impl FnOnce(&mut String)) -> String {
        let mut out = snapshot_header(op, rule);
        sections(&mut out);
        normalize_snapshot_text(&out)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        SquareSharedGroup,
        SquareSplitGroups,
        CubeHardEdges,
        CubeSmooth,
        DegenerateSliver,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::SquareSharedGroup,
            Scenario::SquareSplitGroups,
            Scenario::CubeHardEdges,
            Scenario::CubeSmooth,
            Scenario::DegenerateSliver,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::SquareSharedGroup => "square_shared_group",
                Scenario::SquareSplitGroups => "square_split_groups",
                Scenario::CubeHardEdges => "cube_hard_edges",
                Scenario::CubeSmooth => "cube_smooth",
                Scenario::DegenerateSliver => "degenerate_sliver",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            match name {
                "square_shared_group" => Some(Scenario::SquareSharedGroup),
                "square_split_groups" => Some(Scenario::SquareSplitGroups),
                "cube_hard_edges" => Some(Scenario::CubeHardEdges),
                "cube_smooth" => Some(Scenario::CubeSmooth),
                "degenerate_sliver" => Some(Scenario::DegenerateSliver),
                _ => None,
            }
        }

        fn build_mesh(self) -> SmoothingMesh {
            match self {
                Scenario::SquareSharedGroup => unit_square([1, 1]),
                Scenario::SquareSplitGroups => unit_square([1, 2]),
                // one group bit per side
                Scenario::CubeHardEdges => unit_cube(|side| 1 << side),
                Scenario::CubeSmooth => unit_cube(|_| 1),
                Scenario::DegenerateSliver => degenerate_sliver(),
            }
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        mesh: SmoothingMesh,
        diag: SmoothingDiagnostics,
        snapshot: String,
    }

    fn run_scenario(scenario: Scenario, options: &SmoothingOptions) -> Result<ScenarioOutput, String> {
        let mut mesh = scenario.build_mesh();
        let diag = compute_smoothing_normals_with_options(&mut mesh, options).map_err(|e| e.to_string())?;

        let snap = snapshot(scenario.name(), options.rule, |out| {
            write_diagnostics(out, &diag);
            write_mesh(out, &mesh);
        });

        Ok(ScenarioOutput {
            name: scenario.name(),
            mesh,
            diag,
            snapshot: snap,
        })
    }

    fn unit_square(groups: [u32; 2]) -> SmoothingMesh {
        SmoothingMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![
                SmoothingFace::new([0, 1, 2], groups[0]),
                SmoothingFace::new([0, 2, 3], groups[1]),
            ],
        )
    }

    /// Unit cube with outward winding and one position per triangle corner.
    fn unit_cube(group_for_side: impl Fn(u32) -> u32) -> SmoothingMesh {
        // (origin, u, v) with u x v pointing outward
        let sides = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];

        let mut mesh = SmoothingMesh::default();
        for (side, (origin, u, v)) in (0u32..).zip(sides) {
            let o = Point3::from_array(origin);
            let u = Vec3::from_array(u);
            let v = Vec3::from_array(v);
            let quad = [o, o + u, o + u + v, o + v];
            let group = group_for_side(side);

            for tri in [[0, 1, 2], [0, 2, 3]] {
                let base = mesh.positions.len() as u32;
                mesh.positions.extend(tri.map(|k| quad[k]));
                mesh.faces
                    .push(SmoothingFace::new([base, base + 1, base + 2], group));
            }
        }
        mesh
    }

    /// A right triangle plus a collinear sliver along its hypotenuse, same group.
    fn degenerate_sliver() -> SmoothingMesh {
        SmoothingMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 0.5, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![
                SmoothingFace::new([0, 1, 2], 1),
                SmoothingFace::new([3, 4, 5], 1),
            ],
        )
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
