use jagstore::container::Compression;
use jagstore::{pack, unpack, recovery, Storage};
use tempfile::tempdir;

#[test]
fn round_trips_a_compressed_entry_through_storage() {
    let dir = tempdir().unwrap();
    let storage = Storage::new(dir.path()).unwrap();
    let mut volume = storage.open(0).unwrap();

    let contents = b"Hello, jagstore!".repeat(64);
    let packed = pack(&contents, Compression::Gzip).unwrap();

    volume.write(0, &packed).unwrap();

    let read_back = volume.read(0).unwrap();
    let unpacked = unpack(&read_back).unwrap();
    assert_eq!(unpacked, contents);
}

#[test]
fn overwriting_an_entry_in_place_is_visible_on_the_next_read() {
    let dir = tempdir().unwrap();
    let storage = Storage::new(dir.path()).unwrap();
    let mut volume = storage.open(0).unwrap();

    volume.write(3, &pack(b"first version", Compression::None).unwrap()).unwrap();
    volume.write(3, &pack(b"second, longer version of the same entry", Compression::None).unwrap()).unwrap();

    let unpacked = unpack(&volume.read(3).unwrap()).unwrap();
    assert_eq!(unpacked, b"second, longer version of the same entry");
}

#[test]
fn scan_volume_reconstructs_entries_without_the_references_file() {
    let dir = tempdir().unwrap();
    let storage = Storage::new(dir.path()).unwrap();
    let mut volume = storage.open(0).unwrap();

    volume.write(0, &vec![1u8; 5000]).unwrap();
    volume.write(1, &vec![2u8; 50]).unwrap();

    let blocks = std::fs::File::open(dir.path().join("main_file_cache.dat2")).unwrap();
    let entries = recovery::scan_volume(&blocks, 0).unwrap();

    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .all(|e| e.health == recovery::ChainHealth::Consistent));
}
