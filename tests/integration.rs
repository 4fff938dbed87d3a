use sg_engine::geom::{
    Point3, SmoothingMesh, SmoothingOptions, SmoothingRule, Vec3, compute_smoothing_normals,
    compute_smoothing_normals_batch, compute_smoothing_normals_with_options,
    compute_smoothing_normals_with_rule,
};
use sg_engine::parse::{self, AseError};

const CUBE_VERTICES: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

/// Two outward-wound triangles per side: bottom, top, front, back, right, left.
const CUBE_FACES: [[u32; 3]; 12] = [
    [0, 2, 1],
    [0, 3, 2],
    [4, 5, 6],
    [4, 6, 7],
    [0, 1, 5],
    [0, 5, 4],
    [3, 7, 6],
    [3, 6, 2],
    [1, 2, 6],
    [1, 6, 5],
    [0, 4, 7],
    [0, 7, 3],
];

const SIDE_NORMALS: [Vec3; 6] = [
    Vec3::new(0.0, 0.0, -1.0),
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(0.0, -1.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(-1.0, 0.0, 0.0),
];

/// ASE text for the unit cube, `groups[side]` is the `*MESH_SMOOTHING` list of each side.
fn cube_ase(name: &str, groups: [&str; 6]) -> String {
    let mut text = String::from("*3DSMAX_ASCIIEXPORT\t200\n*COMMENT \"cube fixture\"\n");
    text.push_str("*MATERIAL_LIST {\n\t*MATERIAL_COUNT 1\n\t*MATERIAL 0 {\n\t\t*MATERIAL_NAME \"Grey\"\n\t}\n}\n");
    text.push_str(&format!("*GEOMOBJECT {{\n\t*NODE_NAME \"{name}\"\n\t*MESH {{\n"));
    text.push_str("\t\t*MESH_NUMVERTEX 8\n\t\t*MESH_NUMFACES 12\n\t\t*MESH_VERTEX_LIST {\n");
    for (i, [x, y, z]) in CUBE_VERTICES.iter().enumerate() {
        text.push_str(&format!("\t\t\t*MESH_VERTEX {i:4}\t{x:.4}\t{y:.4}\t{z:.4}\n"));
    }
    text.push_str("\t\t}\n\t\t*MESH_FACE_LIST {\n");
    for (i, [a, b, c]) in CUBE_FACES.iter().enumerate() {
        let side = i / 2;
        text.push_str(&format!(
            "\t\t\t*MESH_FACE {i:4}:    A: {a:4} B: {b:4} C: {c:4} AB:    1 BC:    1 CA:    0\t *MESH_SMOOTHING {} \t*MESH_MTLID {side}\n",
            groups[side]
        ));
    }
    text.push_str("\t\t}\n\t\t*MESH_NORMALS {\n\t\t\t*MESH_FACENORMAL 0\t0.0000\t0.0000\t-1.0000\n\t\t}\n");
    text.push_str("\t}\n\t*MATERIAL_REF 0\n}\n");
    text
}

fn load_cube(groups: [&str; 6]) -> SmoothingMesh {
    let scene = parse::parse_str(&cube_ase("Box01", groups)).expect("parse cube");
    assert_eq!(scene.meshes.len(), 1);
    scene.meshes[0].mesh.clone()
}

fn approx_eq_vec(a: Vec3, b: Vec3) -> bool {
    (a - b).length() <= 1e-12
}

#[test]
fn parses_cube_fixture() {
    let scene = parse::parse_str(&cube_ase("Box01", ["1", "2", "3", "4", "5", "6"])).unwrap();
    assert_eq!(scene.material_count, 1);

    let object = &scene.meshes[0];
    assert_eq!(object.name, "Box01");
    assert_eq!(object.material_ref, Some(0));
    assert_eq!(object.mesh.vertex_count(), 8);
    assert_eq!(object.mesh.face_count(), 12);
    assert_eq!(object.mesh.positions[6], Point3::new(1.0, 1.0, 1.0));
    assert_eq!(object.mesh.faces[11].indices, [0, 7, 3]);
    assert_eq!(object.mesh.faces[0].smoothing_group, 1 << 1);
    assert_eq!(object.mesh.faces[11].smoothing_group, 1 << 6);
    assert_eq!(object.face_material_ids, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
}

#[test]
fn hard_edged_cube_keeps_side_normals() {
    let mut mesh = load_cube(["1", "2", "3", "4", "5", "6"]).unjoined();
    let diag = compute_smoothing_normals(&mut mesh).unwrap();

    assert_eq!(mesh.normals.len(), 36);
    for (f, face) in mesh.faces.iter().enumerate() {
        let expected = SIDE_NORMALS[f / 2];
        for &i in &face.indices {
            assert_eq!(mesh.normals[i as usize], expected, "face {f} corner {i}");
        }
    }
    assert!(diag.is_clean());
    assert_eq!(diag.corner_entry_count, 36);
}

#[test]
fn smooth_cube_normals_point_out_of_corners() {
    let mut mesh = load_cube(["1"; 6]).unjoined();
    compute_smoothing_normals(&mut mesh).unwrap();

    let center = Point3::new(0.5, 0.5, 0.5);
    for (i, n) in mesh.normals.iter().enumerate() {
        let outward = mesh.positions[i] - center;
        assert!((n.length() - 1.0).abs() < 1e-12);
        for (component, direction) in n.to_array().into_iter().zip(outward.to_array()) {
            assert!(component * direction > 0.0, "corner {i}: {n:?}");
        }
    }
}

#[test]
fn sides_sharing_one_group_bit_smooth_together() {
    // Bottom and front share group 7; the rest are isolated.
    let mut mesh = load_cube(["1,7", "2", "3, 7", "4", "5", "6"]).unjoined();
    compute_smoothing_normals(&mut mesh).unwrap();

    // Corner (0,0,0) of the first bottom triangle sees bottom and front only.
    let n = mesh.normals[0];
    assert_eq!(n.x, 0.0);
    assert!(n.y < 0.0 && n.z < 0.0);

    // Top corners are untouched.
    assert!(approx_eq_vec(mesh.normals[6], Vec3::Z));
}

#[test]
fn welded_cube_takes_normal_of_last_face() {
    let mut mesh = load_cube(["1", "2", "3", "4", "5", "6"]);
    compute_smoothing_normals(&mut mesh).unwrap();

    assert_eq!(mesh.normals.len(), 8);
    // (0,0,0): last touched by the left side
    assert_eq!(mesh.normals[0], Vec3::new(-1.0, 0.0, 0.0));
    // (1,1,1): last touched by the right side
    assert_eq!(mesh.normals[6], Vec3::X);
    // (0,1,1): last touched by the left side
    assert_eq!(mesh.normals[7], Vec3::new(-1.0, 0.0, 0.0));
    // (1,0,1): last touched by the right side
    assert_eq!(mesh.normals[5], Vec3::X);
}

#[test]
fn ungrouped_cube_rule_choice() {
    // Mask 0 only matches mask 0, so ungrouped sides still smooth together.
    let mut shared = load_cube(["", "", "", "", "", ""]).unjoined();
    compute_smoothing_normals(&mut shared).unwrap();
    let n = shared.normals[0];
    assert!(n.x < 0.0 && n.y < 0.0 && n.z < 0.0);

    let mut all = load_cube(["", "", "", "", "", ""]).unjoined();
    let options = SmoothingOptions::default().with_rule(SmoothingRule::UngroupedMatchesAll);
    compute_smoothing_normals_with_options(&mut all, &options).unwrap();
    assert_eq!(all.normals, shared.normals);

    // A plain bitwise test never matches mask 0, not even the corner itself.
    let mut unmatched = load_cube(["", "", "", "", "", ""]).unjoined();
    let strict = |query: u32, entry: u32| query & entry != 0;
    compute_smoothing_normals_with_rule(&mut unmatched, &SmoothingOptions::default(), &strict).unwrap();
    assert!(unmatched.normals.iter().all(|n| n.is_zero()));
}

#[test]
fn batch_over_scene_objects() {
    let text = format!(
        "{}{}",
        cube_ase("Hard", ["1", "2", "3", "4", "5", "6"]),
        cube_ase("Soft", ["1"; 6])
    );
    let scene = parse::parse_str(&text).unwrap();
    assert_eq!(scene.meshes.len(), 2);
    assert_eq!(scene.meshes[1].name, "Soft");

    let mut meshes: Vec<SmoothingMesh> = scene.meshes.iter().map(|m| m.mesh.unjoined()).collect();
    let results = compute_smoothing_normals_batch(&mut meshes, &SmoothingOptions::default());

    let mut total = results[0].clone().unwrap();
    total.merge(results[1].as_ref().unwrap());
    assert_eq!(total.face_count, 24);
    assert_eq!(total.vertex_count, 72);

    assert_eq!(meshes[0].normals[0], Vec3::new(0.0, 0.0, -1.0));
    assert!(meshes[1].normals[0].x < 0.0);
}

#[test]
fn truncated_document_is_rejected() {
    let text = cube_ase("Box01", ["1"; 6]);
    let cut = text.trim_end().trim_end_matches('}');
    assert!(matches!(
        parse::parse_str(cut),
        Err(AseError::UnexpectedEof { .. })
    ));
}
