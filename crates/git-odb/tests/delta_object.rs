//! Tests for the delta-object escape hatch: returning a packed object's
//! still-deltified payload plus its base OID, without materializing it.

use git_hash::{hasher::Hasher, HashAlgorithm};
use git_object::ObjectType;
use git_odb::ObjectDatabase;
use git_pack::write::{build_pack_index, PackWriter};

/// Build a pack containing one non-delta base blob and one REF_DELTA blob
/// against it, under `<dir>/objects/pack/`, then open an `ObjectDatabase`
/// rooted at `<dir>/objects`.
fn setup_odb_with_delta_pack() -> (tempfile::TempDir, ObjectDatabase, git_hash::ObjectId, git_hash::ObjectId) {
    let dir = tempfile::tempdir().unwrap();
    let objects_dir = dir.path().join("objects");
    let pack_dir = objects_dir.join("pack");
    std::fs::create_dir_all(&pack_dir).unwrap();

    let base_content = b"The quick brown fox jumps over the lazy dog, again and again.";
    let derived_content = b"The quick brown fox jumps over the lazy dog, again and again!!";

    let base_oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", base_content).unwrap();
    let derived_oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", derived_content).unwrap();

    let pack_path = pack_dir.join("pack-delta-test.pack");
    let idx_path = pack_dir.join("pack-delta-test.idx");

    let mut writer = PackWriter::new(&pack_path).unwrap();
    writer.add_object(ObjectType::Blob, base_content).unwrap();
    let delta = git_pack::delta::compute::compute_delta(base_content, derived_content);
    writer.add_delta(base_oid, derived_oid, &delta).unwrap();

    let mut entries: Vec<_> = writer
        .entries()
        .map(|(oid, off, crc)| (*oid, off, crc))
        .collect();
    let (_, checksum) = writer.finish().unwrap();
    build_pack_index(&idx_path, &mut entries, &checksum).unwrap();

    let odb = ObjectDatabase::open(&objects_dir).unwrap();
    (dir, odb, base_oid, derived_oid)
}

#[test]
fn delta_object_returns_unresolved_delta_and_base() {
    let (_dir, odb, base_oid, derived_oid) = setup_odb_with_delta_pack();

    let delta = odb
        .delta_object(&derived_oid)
        .unwrap()
        .expect("derived object should be stored as a delta");
    assert_eq!(delta.base, base_oid);
    assert!(!delta.delta_data.is_empty());

    // The fully resolved object must still decode to the same plaintext.
    let resolved = odb.read(&derived_oid).unwrap().expect("object resolves");
    match resolved {
        git_object::Object::Blob(b) => {
            assert_eq!(
                b.data,
                b"The quick brown fox jumps over the lazy dog, again and again!!"
            );
        }
        other => panic!("expected blob, got {:?}", other.object_type()),
    }
}

#[test]
fn delta_object_returns_none_for_non_delta_object() {
    let (_dir, odb, base_oid, _derived_oid) = setup_odb_with_delta_pack();

    assert!(odb.delta_object(&base_oid).unwrap().is_none());
}

#[test]
fn delta_object_returns_none_for_missing_object() {
    let (_dir, odb, _base_oid, _derived_oid) = setup_odb_with_delta_pack();
    let missing =
        git_hash::ObjectId::from_hex("0000000000000000000000000000000000000001").unwrap();
    assert!(odb.delta_object(&missing).unwrap().is_none());
}
