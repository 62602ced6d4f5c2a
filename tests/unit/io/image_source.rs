use super::*;
use crate::frame::{alloc::HeapAllocator, forwarder::ReadCursor};

#[test]
fn blank_canvas_uses_the_colour() {
    let img = blank((2, 1), Some("#ff000080")).unwrap();
    assert_eq!(img.to_rgba8().into_raw(), vec![255, 0, 0, 128, 255, 0, 0, 128]);
    let clear = blank((1, 1), None).unwrap();
    assert_eq!(clear.to_rgba8().into_raw(), vec![0, 0, 0, 0]);
    assert!(blank((0, 1), None).is_err());
    assert!(blank((1, 1), Some("red")).is_err());
}

#[test]
fn start_commits_once_in_hold_mode() {
    let src = ImageSource::new(
        "logo",
        blank((3, 2), Some("#00ff00")).unwrap(),
        &HeapAllocator::new(),
    );
    assert!(src.start());

    let f = src.frames();
    assert_eq!((f.info().width, f.info().height), (3, 2));
    f.age(std::time::Duration::from_secs(60));
    assert!(f.is_live());

    let mut cursor = ReadCursor::new();
    let r = f.get_fresh_for_reading(&mut cursor).unwrap();
    assert_eq!(&r.data()[..4], &[0, 255, 0, 255]);
    f.finished_reading(r);
}

#[test]
fn missing_file_is_an_error() {
    let err = load(Path::new("/definitely/not/here.png"), None).unwrap_err();
    assert!(err.to_string().contains("read image"), "{err}");
}

#[test]
fn load_resizes_when_asked() {
    let dir = std::env::temp_dir().join(format!("stagehand-img-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("pixel.png");
    blank((4, 4), Some("#102030")).unwrap().save(&path).unwrap();

    let img = load(&path, Some((2, 2))).unwrap();
    assert_eq!((img.width(), img.height()), (2, 2));
    let same = load(&path, None).unwrap();
    assert_eq!((same.width(), same.height()), (4, 4));
    std::fs::remove_dir_all(&dir).unwrap();
}
