use super::Fixture;
use crate::error::Error;
use crate::item::{DeepFolder, DeepItem, Depth, File, Folder, Item, StubItem};
use serde_json::json;

fn deep_folder(folder: Option<Folder>) -> DeepFolder {
    folder
        .and_then(Folder::into_deep)
        .expect("deep folder")
}

#[tokio::test]
async fn test_write_then_read_deep() {
    let Fixture { fs, .. } = Fixture::new().await;

    fs.write_file("/user/notes.txt", "hello").await.unwrap();
    let file = fs
        .get_file("/user/notes.txt", Depth::Deep)
        .await
        .unwrap()
        .and_then(File::into_deep)
        .unwrap();
    assert_eq!(file.name, "notes.txt");
    assert_eq!(file.content.as_text(), Some("hello"));
    assert!(file.last_modified > 0);

    // Overwrite truncates
    fs.write_file("/user/notes.txt", "hi").await.unwrap();
    let file = fs.get_file("/user/notes.txt", Depth::Deep).await.unwrap().unwrap();
    assert_eq!(file.content().and_then(|c| c.as_text()), Some("hi"));
}

#[tokio::test]
async fn test_binary_content_round_trip() {
    let Fixture { fs, .. } = Fixture::new().await;
    let bytes = vec![0u8, 159, 146, 150, 255];
    fs.write_file("/user/blob.bin", &bytes).await.unwrap();
    let file = fs.get_file("/user/blob.bin", Depth::Deep).await.unwrap().unwrap();
    assert_eq!(file.content().map(|c| c.as_bytes()), Some(bytes.as_slice()));
}

#[tokio::test]
async fn test_folder_scenario_shapes() {
    let Fixture { fs, .. } = Fixture::new().await;
    fs.create_folder("/f").await.unwrap();
    fs.write_file("/f/b.txt", "x").await.unwrap();

    let shallow = fs.get_folder("/f", Depth::Shallow).await.unwrap().unwrap();
    let mut value = serde_json::to_value(&shallow).unwrap();
    let modified = value["items"]["b.txt"]["lastModified"].take();
    assert!(modified.is_i64());
    assert_eq!(
        value,
        json!({"name": "f", "items": {"b.txt": {"type": "file", "name": "b.txt", "lastModified": null}}})
    );

    let deep = fs.get_folder("/f", Depth::Deep).await.unwrap().unwrap();
    let value = serde_json::to_value(&deep).unwrap();
    assert_eq!(value["items"]["b.txt"]["content"], json!("x"));
    assert_eq!(value["items"]["b.txt"]["type"], json!("file"));
}

#[tokio::test]
async fn test_deep_folder_matches_per_file_reads() {
    let Fixture { fs, .. } = Fixture::new().await;
    fs.write_file("/user/a.txt", "A").await.unwrap();
    fs.write_file("/user/docs/b.txt", "B").await.unwrap();
    fs.write_file("/user/docs/deeper/c.txt", "C").await.unwrap();
    fs.create_folder("/user/empty").await.unwrap();

    let tree = deep_folder(fs.get_folder("/user", Depth::Deep).await.unwrap());
    assert_eq!(tree.items.len(), 3);

    fn check<'a>(
        fs: &'a crate::FsManager,
        at: String,
        folder: &'a DeepFolder,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
        Box::pin(async move {
            for (name, item) in &folder.items {
                let child = crate::path::join(&at, name);
                match item {
                    DeepItem::File(file) => {
                        let direct = fs.get_file(&child, Depth::Deep).await.unwrap().unwrap();
                        assert_eq!(direct.content(), Some(&file.content), "{child}");
                    }
                    DeepItem::Folder(sub) => check(fs, child, sub).await,
                }
            }
        })
    }
    check(&fs, "/user".to_string(), &tree).await;
}

#[tokio::test]
async fn test_depths_agree_on_children() {
    let Fixture { fs, .. } = Fixture::new().await;
    fs.write_file("/user/a.txt", "A").await.unwrap();
    fs.create_folder("/user/sub").await.unwrap();

    let shallow = fs.get_folder("/user", Depth::Shallow).await.unwrap().unwrap();
    let deep = fs.get_folder("/user", Depth::Deep).await.unwrap().unwrap();
    assert_eq!(shallow.names(), deep.names());
    assert_eq!(deep.into_shallow(), shallow.into_shallow());
}

#[tokio::test]
async fn test_delete_then_missing() {
    let Fixture { fs, .. } = Fixture::new().await;
    fs.write_file("/user/d/x.txt", "x").await.unwrap();

    fs.delete("/user/d").await.unwrap();
    assert_eq!(fs.get_folder("/user/d", Depth::Shallow).await.unwrap(), None);
    assert_eq!(fs.get_file("/user/d/x.txt", Depth::Deep).await.unwrap(), None);

    assert_eq!(
        fs.delete("/user/d").await,
        Err(Error::not_found("/user/d"))
    );
    assert_eq!(fs.delete("/").await, Err(Error::invalid_path("/")));
}

#[tokio::test]
async fn test_kind_mismatches_read_as_missing() {
    let Fixture { fs, .. } = Fixture::new().await;
    fs.write_file("/user/a.txt", "A").await.unwrap();
    assert_eq!(fs.get_folder("/user/a.txt", Depth::Shallow).await.unwrap(), None);
    assert_eq!(fs.get_file("/user", Depth::Shallow).await.unwrap(), None);

    assert!(matches!(
        fs.get_item("/user/a.txt", Depth::Shallow).await.unwrap(),
        Some(Item::File(File::Stub(_)))
    ));
    assert!(matches!(
        fs.get_item("/user", Depth::Shallow).await.unwrap(),
        Some(Item::Folder(Folder::Shallow(_)))
    ));
}

#[tokio::test]
async fn test_create_conflicts() {
    let Fixture { fs, .. } = Fixture::new().await;
    fs.write_file("/user/a.txt", "A").await.unwrap();
    assert_eq!(
        fs.create_folder("/user/a.txt").await,
        Err(Error::already_exists("/user/a.txt"))
    );
    assert_eq!(
        fs.write_file("/user", "oops").await,
        Err(Error::already_exists("/user"))
    );
    assert_eq!(
        fs.write_file("/user/a.txt/b", "x").await,
        Err(Error::not_a_directory("/user/a.txt"))
    );
}

#[tokio::test]
async fn test_dot_segments_rejected() {
    let Fixture { fs, .. } = Fixture::new().await;
    assert_eq!(
        fs.get_file("/user/../x", Depth::Shallow).await,
        Err(Error::invalid_path("/user/../x"))
    );
    assert_eq!(
        fs.write_file("/./x", "1").await,
        Err(Error::invalid_path("/./x"))
    );
}

#[tokio::test]
async fn test_insert_tree() {
    let Fixture { fs, .. } = Fixture::new().await;
    let tree = DeepFolder::new("project")
        .with_file("readme.md", "# hi")
        .with_folder(DeepFolder::new("src").with_file("main.rs", "fn main() {}"));

    fs.insert("/user/project", &DeepItem::Folder(tree.clone()))
        .await
        .unwrap();
    let read = deep_folder(fs.get_folder("/user/project", Depth::Deep).await.unwrap());
    assert!(read.content_eq(&tree));

    // Re-inserting overwrites leaves without error
    fs.insert("/user/project", &DeepItem::Folder(tree.clone()))
        .await
        .unwrap();
    assert_eq!(
        fs.insert("/", &DeepItem::File(crate::DeepFile::new("x", "1", 0)))
            .await,
        Err(Error::invalid_path("/"))
    );
}

#[tokio::test]
async fn test_move_within_root() {
    let Fixture { fs, .. } = Fixture::new().await;
    fs.write_file("/user/a/one.txt", "1").await.unwrap();
    fs.write_file("/user/a/sub/two.txt", "2").await.unwrap();
    let before = deep_folder(fs.get_folder("/user/a", Depth::Deep).await.unwrap());

    fs.move_item("/user/a", "/user/b").await.unwrap();

    assert_eq!(fs.get_folder("/user/a", Depth::Shallow).await.unwrap(), None);
    let mut after = deep_folder(fs.get_folder("/user/b", Depth::Deep).await.unwrap());
    after.name = before.name.clone();
    assert!(after.content_eq(&before));
}

#[tokio::test]
async fn test_move_edge_cases() {
    let Fixture { fs, .. } = Fixture::new().await;
    fs.write_file("/user/a/x.txt", "x").await.unwrap();

    fs.move_item("/user/a", "/user/a/").await.unwrap();
    assert!(fs.get_folder("/user/a", Depth::Shallow).await.unwrap().is_some());

    assert_eq!(
        fs.move_item("/user/a", "/user/a/inner").await,
        Err(Error::invalid_path("/user/a/inner"))
    );
    assert_eq!(
        fs.move_item("/user/missing", "/user/z").await,
        Err(Error::not_found("/user/missing"))
    );
    assert_eq!(fs.move_item("/", "/user/z").await, Err(Error::invalid_path("/")));
}

#[tokio::test]
async fn test_move_onto_existing_overwrites_leaves() {
    let Fixture { fs, .. } = Fixture::new().await;
    fs.write_file("/user/a/x.txt", "new").await.unwrap();
    fs.write_file("/user/b/x.txt", "old").await.unwrap();
    fs.write_file("/user/b/keep.txt", "keep").await.unwrap();

    fs.move_item("/user/a", "/user/b").await.unwrap();

    let b = deep_folder(fs.get_folder("/user/b", Depth::Deep).await.unwrap());
    let DeepItem::File(x) = &b.items["x.txt"] else {
        panic!("x.txt should be a file");
    };
    assert_eq!(x.content.as_text(), Some("new"));
    assert!(b.items.contains_key("keep.txt"));
    assert_eq!(fs.get_folder("/user/a", Depth::Shallow).await.unwrap(), None);
}

#[tokio::test]
async fn test_unique_name() {
    let Fixture { fs, .. } = Fixture::new().await;
    assert_eq!(fs.unique_name("/user", "a.txt").await.unwrap(), "a.txt");

    fs.write_file("/user/a.txt", "").await.unwrap();
    fs.write_file("/user/a_1.txt", "").await.unwrap();
    assert_eq!(fs.unique_name("/user", "a.txt").await.unwrap(), "a_2.txt");

    fs.create_folder("/user/dir").await.unwrap();
    assert_eq!(fs.unique_name("/user", "dir").await.unwrap(), "dir_1");
    assert_eq!(fs.unique_name("/nowhere", "dir").await.unwrap(), "dir");
}

#[tokio::test]
async fn test_revoked_root_fails_closed() {
    let Fixture { store, fs, .. } = Fixture::new().await;
    fs.write_file("/user/a.txt", "A").await.unwrap();

    store.set_revoked(true);
    assert_eq!(fs.get_file("/user/a.txt", Depth::Deep).await.unwrap(), None);
    assert_eq!(fs.get_folder("/user", Depth::Deep).await.unwrap(), None);
    assert!(matches!(
        fs.write_file("/user/b.txt", "B").await,
        Err(Error::PermissionDenied(_))
    ));

    store.set_revoked(false);
    assert!(fs.get_file("/user/a.txt", Depth::Shallow).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_cached_folder_sees_writes_on_next_poll() {
    let Fixture { fs, .. } = Fixture::new().await;
    let mut user = fs.get_cached_folder("/user", Depth::Shallow);

    let first = user.changed().await.unwrap().ready().unwrap().unwrap();
    assert!(first.names().is_empty());

    fs.write_file("/user/new.txt", "n").await.unwrap();
    let second = user.changed().await.unwrap().ready().unwrap().unwrap();
    assert_eq!(second.names(), vec!["new.txt"]);

    let Folder::Shallow(listing) = second else {
        panic!("shallow subscription yields shallow folders");
    };
    assert!(matches!(listing.items["new.txt"], StubItem::File(_)));
}

#[tokio::test(start_paused = true)]
async fn test_cached_file_missing_then_present() {
    let Fixture { fs, .. } = Fixture::new().await;
    let mut sub = fs.get_cached_file("/user/later.txt", Depth::Deep);
    assert_eq!(sub.key().path, "/user/later.txt");

    assert_eq!(sub.changed().await.unwrap().ready(), Some(None));
    fs.write_file("/user/later.txt", "now").await.unwrap();
    let file = sub.changed().await.unwrap().ready().unwrap().unwrap();
    assert_eq!(file.content().and_then(|c| c.as_text()), Some("now"));

    assert_eq!(fs.file_cache().len(), 1);
    drop(sub);
    assert!(fs.file_cache().is_empty());
}
