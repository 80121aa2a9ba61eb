use vfs::{MemoryFs, NodeKind, Vfs, VfsError};

#[test]
fn mkdir_cd_up_restores_path() {
    let mut fs = MemoryFs::new();
    fs.mkdir("a").unwrap();
    let before = fs.cwd().to_vec();
    fs.cd("a").unwrap();
    assert_eq!(fs.pwd(), "/a");
    fs.cd("..").unwrap();
    assert_eq!(fs.cwd(), before.as_slice());
    assert_eq!(fs.pwd(), "/");
}

#[test]
fn cd_up_at_root_is_noop() {
    let mut fs = MemoryFs::new();
    fs.cd("..").unwrap();
    fs.cd("..").unwrap();
    assert!(fs.cwd().is_empty());
}

#[test]
fn mkdir_twice_fails() {
    let mut fs = MemoryFs::new();
    fs.mkdir("docs").unwrap();
    assert_eq!(fs.mkdir("docs"), Err(VfsError::AlreadyExists("docs".into())));
    fs.write("notes", "x").unwrap();
    assert_eq!(fs.mkdir("notes"), Err(VfsError::AlreadyExists("notes".into())));
}

#[test]
fn cd_into_missing_or_file_fails() {
    let mut fs = MemoryFs::new();
    fs.write("f", "x").unwrap();
    assert_eq!(fs.cd("nope"), Err(VfsError::NotFound("nope".into())));
    assert_eq!(fs.cd("f"), Err(VfsError::NotADirectory("f".into())));
    assert!(fs.cwd().is_empty());
}

#[test]
fn write_read_rm() {
    let mut fs = MemoryFs::new();
    fs.write("f", "x").unwrap();
    assert_eq!(fs.read("f").unwrap(), "x");
    fs.rm("f").unwrap();
    assert_eq!(fs.read("f"), Err(VfsError::NotFound("f".into())));
    assert_eq!(fs.rm("f"), Err(VfsError::NotFound("f".into())));
}

#[test]
fn write_overwrites_in_place() {
    let mut fs = MemoryFs::new();
    fs.write("a", "1").unwrap();
    fs.mkdir("b").unwrap();
    fs.write("a", "2").unwrap();
    let names: Vec<_> = fs.ls().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(fs.read("a").unwrap(), "2");
}

#[test]
fn ls_reports_kinds_in_insertion_order() {
    let mut fs = MemoryFs::new();
    fs.mkdir("zeta").unwrap();
    fs.write("alpha.txt", "hello").unwrap();
    fs.mkdir("beta").unwrap();
    let listing = fs.ls().unwrap();
    let got: Vec<_> = listing.iter().map(|e| (e.name.as_str(), e.kind)).collect();
    assert_eq!(
        got,
        vec![
            ("zeta", NodeKind::Directory),
            ("alpha.txt", NodeKind::File),
            ("beta", NodeKind::Directory),
        ]
    );
    assert_eq!(listing[0].to_string(), "[DIR] zeta");
    assert_eq!(listing[1].to_string(), "alpha.txt");
}

#[test]
fn rm_directory_drops_subtree() {
    let mut fs = MemoryFs::new();
    fs.mkdir("proj").unwrap();
    fs.cd("proj").unwrap();
    fs.write("main.s", "halt").unwrap();
    fs.cd("..").unwrap();
    fs.rm("proj").unwrap();
    assert!(fs.ls().unwrap().is_empty());
    fs.mkdir("proj").unwrap();
    fs.cd("proj").unwrap();
    assert!(fs.ls().unwrap().is_empty());
}

#[test]
fn nested_operations_use_working_directory() {
    let mut fs = MemoryFs::new();
    fs.mkdir("home").unwrap();
    fs.cd("home").unwrap();
    fs.mkdir("user").unwrap();
    fs.cd("user").unwrap();
    fs.write("todo", "ship it").unwrap();
    assert_eq!(fs.pwd(), "/home/user");
    fs.cd("..").unwrap();
    assert_eq!(fs.read("todo"), Err(VfsError::NotFound("todo".into())));
    assert_eq!(fs.read("user"), Err(VfsError::IsADirectory("user".into())));
}

#[test]
fn rejects_invalid_names() {
    let mut fs = MemoryFs::new();
    assert_eq!(fs.mkdir(""), Err(VfsError::InvalidName("".into())));
    assert_eq!(fs.mkdir("a/b"), Err(VfsError::InvalidName("a/b".into())));
    assert_eq!(fs.write("..", "x"), Err(VfsError::InvalidName("..".into())));
    assert!(fs.ls().unwrap().is_empty());
}
