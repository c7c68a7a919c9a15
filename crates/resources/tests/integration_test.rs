//! Integration tests for loading assets from disk through the cache.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use meshview_resources::{ImageData, MeshData, ResourceError, ResourceManager};

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meshview-resources-it-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

const TRIANGLE_OBJ: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
f 1/1 2/2 3/3
";

#[test]
fn test_load_obj_from_disk() {
    let path = temp_dir().join("triangle.obj");
    fs::write(&path, TRIANGLE_OBJ).expect("write obj");

    let mesh = MeshData::load_obj(&path).expect("Failed to load OBJ mesh");

    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.triangle_count(), 1);
    assert_eq!(mesh.tex_coords.len(), mesh.positions.len());
    assert_eq!(mesh.vertices().len(), 3);
}

#[test]
fn test_malformed_obj_reports_path() {
    let path = temp_dir().join("broken.obj");
    fs::write(&path, "v 0.0 zero 0.0\nf 1 2 3\n").expect("write obj");

    match MeshData::load_obj(&path) {
        Err(ResourceError::ObjLoad { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected ObjLoad error, got {:?}", other),
    }
}

#[test]
fn test_mesh_cache_shares_loaded_mesh() {
    let path = temp_dir().join("cached.obj");
    fs::write(&path, TRIANGLE_OBJ).expect("write obj");

    let mut meshes: ResourceManager<MeshData> = ResourceManager::new();
    let a = meshes
        .create_resource_from_file(&path, MeshData::load_obj)
        .expect("load");
    let b = meshes
        .create_resource_from_file(&path, MeshData::load_obj)
        .expect("cache hit");

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(meshes.len(), 1);
}

#[test]
fn test_load_png_from_disk() {
    let path = temp_dir().join("checker.png");
    let image = image::RgbaImage::from_fn(4, 4, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    });
    image.save(&path).expect("write png");

    let data = ImageData::load(&path).expect("Failed to load PNG");

    assert_eq!((data.width, data.height), (4, 4));
    assert_eq!(data.pixels.len(), 64);
    assert_eq!(&data.pixels[4..8], &[0, 0, 0, 255]);
}
