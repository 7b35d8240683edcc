use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use nest_archive::{ArchiveAddress, ArchiveIndex, ErrorKind, IndexOptions, Locator};
use nest_test_utils::{class_bytes, JarBuilder};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn scenario_jar() -> JarBuilder {
    JarBuilder::new()
        .dir("lib")
        .class("lib/Helper")
        .file("data/file.txt", "outer data")
        .jar(
            "inner.jar",
            JarBuilder::new()
                .class("Util")
                .file("shared.txt", "from inner"),
        )
        .file("shared.txt", "from outer")
}

fn index_of(jar: &JarBuilder, options: &IndexOptions) -> (TempDir, ArchiveIndex) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("outer.jar");
    jar.write_to(&path);
    let index = ArchiveIndex::open(&ArchiveAddress::from_path(&path), options).unwrap();
    (tmp, index)
}

#[test]
fn compiled_units_are_inline_and_resources_are_ordinal() {
    let (_tmp, index) = index_of(&scenario_jar(), &IndexOptions::default());

    let helper = index.get("lib/Helper.class").unwrap();
    assert!(helper.is_inline());
    assert_eq!(helper.inline_bytes().unwrap(), class_bytes("lib/Helper").as_slice());

    let data = index.get("data/file.txt").unwrap();
    assert!(!data.is_inline());
    // `lib/` is position 0, `lib/Helper.class` position 1.
    assert_eq!(data.position(), Some(2));
    assert_eq!(data.read_all().unwrap(), b"outer data");

    assert!(index.get("lib/").is_none(), "directories are not indexed");
}

#[test]
fn nested_archive_becomes_a_child_index() {
    let (_tmp, index) = index_of(&scenario_jar(), &IndexOptions::default());

    assert_eq!(index.children().len(), 1);
    let inner = &index.children()[0];
    assert_eq!(inner.origin(), index.get("inner.jar").unwrap().address());
    assert_eq!(inner.origin().entry_name(), Some("inner.jar"));

    let util = inner.get("Util.class").unwrap();
    assert!(util.is_inline());
    assert_eq!(
        util.address().to_string(),
        format!("{}!/Util.class", nest_archive::ensure_scheme(&inner.origin().to_string()))
    );
    assert_eq!(inner.get("shared.txt").unwrap().read_all().unwrap(), b"from inner");

    let stats = index.stats();
    assert_eq!(stats.archives, 2);
    assert_eq!(stats.inline_entries, 2);
    assert_eq!(stats.max_depth, 1);
}

#[test]
fn non_recursive_index_keeps_nested_jar_as_a_resource() {
    let (_tmp, index) = index_of(&scenario_jar(), &IndexOptions::recursive(false));
    assert!(index.children().is_empty());
    let jar = index.get("inner.jar").unwrap();
    assert_eq!(jar.read_all().unwrap(), JarBuilder::new()
        .class("Util")
        .file("shared.txt", "from inner")
        .build());
}

#[test]
fn ordinal_positions_match_the_archive_reader() {
    let jar = JarBuilder::new()
        .dir("a")
        .file("a/one.txt", "1")
        .dir("a/b")
        .stored("a/b/two.bin", [0u8, 1, 2, 3])
        .class("a/C")
        .file("three.txt", "3");
    let (tmp, index) = index_of(&jar, &IndexOptions::default());

    let file = std::fs::File::open(tmp.path().join("outer.jar")).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut expected = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        if entry.is_dir() {
            continue;
        }
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        expected.insert(entry.name().to_owned(), (i, bytes));
    }

    assert_eq!(index.entries().len(), expected.len());
    for (name, (position, bytes)) in expected {
        let locator = index.get(&name).unwrap();
        if !locator.is_inline() {
            assert_eq!(locator.position(), Some(position), "{name}");
        }
        assert_eq!(locator.read_all().unwrap(), bytes, "{name}");
    }
}

#[test]
fn deeply_nested_ordinal_locators_replay_every_level() {
    let jar = JarBuilder::new().jar(
        "nested_2.jar",
        JarBuilder::new().jar(
            "nested_1.jar",
            JarBuilder::new()
                .dir("1")
                .file("1/resource.txt", "82376437754")
                .class("Deep"),
        ),
    );
    let (_tmp, index) = index_of(&jar, &IndexOptions::default());

    let level2 = &index.children()[0];
    let level1 = &level2.children()[0];
    let resource = level1.get("1/resource.txt").unwrap();
    assert_eq!(resource.position(), Some(1));
    assert_eq!(resource.read_all().unwrap(), b"82376437754");
    assert_eq!(resource.address().depth(), 3);

    let mut streamed = Vec::new();
    resource.open().unwrap().read_to_end(&mut streamed).unwrap();
    assert_eq!(streamed, b"82376437754");
    let mut copied = Vec::new();
    assert_eq!(resource.copy_to(&mut copied).unwrap(), 11);
    assert_eq!(copied, b"82376437754");

    // The same bytes are reachable by walking the address by name.
    assert_eq!(resource.address().read_all().unwrap(), b"82376437754");
    assert_eq!(index.origins().len(), 3);
}

#[test]
fn ordinal_locator_can_be_built_by_hand() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("outer.jar");
    JarBuilder::new()
        .file("zero.txt", "0")
        .file("one.txt", "1")
        .write_to(&path);

    let base = Arc::new(Locator::direct(ArchiveAddress::from_path(&path)));
    let one = Locator::ordinal(base.clone(), "one.txt", 1).unwrap();
    assert_eq!(one.read_all().unwrap(), b"1");

    let past_end = Locator::ordinal(base, "two.txt", 2).unwrap();
    assert_eq!(past_end.read_all().unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn stale_ordinal_position_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("outer.jar");
    JarBuilder::new()
        .file("first.txt", "1")
        .file("second.txt", "2")
        .write_to(&path);
    let index = ArchiveIndex::open(&ArchiveAddress::from_path(&path), &IndexOptions::default())
        .unwrap();

    JarBuilder::new()
        .file("second.txt", "2")
        .file("first.txt", "1")
        .write_to(&path);

    let err = index.get("second.txt").unwrap().read_all().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn malformed_nested_archive_fails_the_whole_build() {
    let jar = JarBuilder::new()
        .file("ok.txt", "fine")
        .file("broken.jar", "this is definitely not a zip archive");
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("outer.jar");
    jar.write_to(&path);

    let err = ArchiveIndex::open(&ArchiveAddress::from_path(&path), &IndexOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert!(err.to_string().contains("broken.jar"), "{err}");

    // Without recursion the same archive indexes fine.
    let index =
        ArchiveIndex::open(&ArchiveAddress::from_path(&path), &IndexOptions::recursive(false))
            .unwrap();
    assert!(index.get("broken.jar").is_some());
}

#[test]
fn build_from_an_open_stream() {
    let bytes = scenario_jar().build();
    let source = Locator::direct(ArchiveAddress::from_path("/virtual/outer.jar"));
    let index =
        ArchiveIndex::build(source, &mut bytes.as_slice(), &IndexOptions::default()).unwrap();
    assert!(index.get("lib/Helper.class").unwrap().is_inline());
    assert_eq!(index.children().len(), 1);
    assert_eq!(index.origin(), &ArchiveAddress::from_path("/virtual/outer.jar"));
}

#[test]
fn custom_suffixes_drive_classification() {
    let jar = JarBuilder::new()
        .file("unit.bin", "compiled")
        .jar("lib/inner.zip", JarBuilder::new().file("x.txt", "x"));
    let options = IndexOptions {
        recursive: true,
        class_suffix: ".bin".to_owned(),
        archive_suffixes: vec![".zip".to_owned()],
    };
    let (_tmp, index) = index_of(&jar, &options);
    assert!(index.get("unit.bin").unwrap().is_inline());
    assert_eq!(index.children().len(), 1);
}

#[test]
fn empty_archive_indexes_to_nothing() {
    let (_tmp, index) = index_of(&JarBuilder::new(), &IndexOptions::default());
    assert!(index.entries().is_empty());
    assert!(index.children().is_empty());
    assert_eq!(index.stats().archives, 1);
}

#[test]
fn empty_nested_archive_does_not_poison_its_parent() {
    let jar = JarBuilder::new()
        .class("Main")
        .jar("lib/empty.jar", JarBuilder::new())
        .file("after.txt", "still reachable");
    let (_tmp, index) = index_of(&jar, &IndexOptions::default());

    assert!(index.get("Main.class").unwrap().is_inline());
    assert_eq!(index.children().len(), 1);
    assert!(index.children()[0].entries().is_empty());
    assert_eq!(index.get("after.txt").unwrap().read_all().unwrap(), b"still reachable");
}

#[test]
fn data_descriptor_entries_index_and_replay() {
    let inner = JarBuilder::new()
        .class("Util")
        .file("shared.txt", "from inner")
        .with_data_descriptors();
    let jar = JarBuilder::new()
        .dir("lib")
        .class("lib/Helper")
        .stored("data/raw.bin", [1u8, 2, 3])
        .file("data/file.txt", "outer data")
        .jar("inner.jar", inner)
        .file("tail.txt", "tail")
        .with_data_descriptors();
    let (_tmp, index) = index_of(&jar, &IndexOptions::default());

    assert_eq!(
        index.get("lib/Helper.class").unwrap().inline_bytes().unwrap(),
        class_bytes("lib/Helper").as_slice()
    );
    assert_eq!(index.get("data/raw.bin").unwrap().read_all().unwrap(), [1, 2, 3]);
    assert_eq!(index.get("data/file.txt").unwrap().read_all().unwrap(), b"outer data");
    assert_eq!(index.get("tail.txt").unwrap().position(), Some(5));
    assert_eq!(index.get("tail.txt").unwrap().read_all().unwrap(), b"tail");

    let inner = &index.children()[0];
    assert!(inner.get("Util.class").unwrap().is_inline());
    let shared = inner.get("shared.txt").unwrap();
    assert_eq!(shared.read_all().unwrap(), b"from inner");
    assert_eq!(shared.address().read_all().unwrap(), b"from inner");
}

#[test]
fn repeated_nested_archive_name_keeps_one_child() {
    let jar = JarBuilder::new()
        .jar("lib/dup.jar", JarBuilder::new().file("first.txt", "1"))
        .jar("lib/dup.jar", JarBuilder::new().file("second.txt", "2"))
        .with_data_descriptors();
    let (_tmp, index) = index_of(&jar, &IndexOptions::default());

    assert_eq!(index.children().len(), 1);
    let child = &index.children()[0];
    assert_eq!(child.origin(), index.get("lib/dup.jar").unwrap().address());
    assert!(child.get("first.txt").is_none());
    assert_eq!(child.get("second.txt").unwrap().read_all().unwrap(), b"2");
    assert_eq!(index.origins().len(), 2);
}
