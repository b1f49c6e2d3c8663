use super::*;
use crate::geom::Rect;
use crate::palette::ElementDescriptor;

fn add(doc: &mut DocStore, x: f64, y: f64) -> ElementId {
    let bounds = Rect::new(0.0, 0.0, 800.0, 600.0);
    doc.add(&ElementDescriptor::new("x", "/x.png"), Point::new(x, y), &bounds).id
}

#[test]
fn miss_on_empty_store() {
    let doc = DocStore::new();
    assert!(hit_test(Point::new(10.0, 10.0), &doc).is_none());
}

#[test]
fn hit_inside_footprint() {
    let mut doc = DocStore::new();
    let id = add(&mut doc, 10.0, 10.0);
    assert_eq!(hit_test(Point::new(50.0, 50.0), &doc), Some(id));
    assert_eq!(hit_test(Point::new(110.0, 110.0), &doc), Some(id));
}

#[test]
fn miss_outside_footprint() {
    let mut doc = DocStore::new();
    add(&mut doc, 10.0, 10.0);
    assert!(hit_test(Point::new(5.0, 50.0), &doc).is_none());
    assert!(hit_test(Point::new(111.0, 50.0), &doc).is_none());
}

#[test]
fn topmost_wins_on_overlap() {
    let mut doc = DocStore::new();
    let below = add(&mut doc, 0.0, 0.0);
    let above = add(&mut doc, 20.0, 20.0);
    assert_eq!(hit_test(Point::new(50.0, 50.0), &doc), Some(above));
    if let Some(e) = doc.get_mut(&below) {
        e.z_index = 10;
    }
    assert_eq!(hit_test(Point::new(50.0, 50.0), &doc), Some(below));
}

#[test]
fn scale_grows_hit_box() {
    let mut doc = DocStore::new();
    let id = add(&mut doc, 0.0, 0.0);
    assert!(hit_test(Point::new(150.0, 150.0), &doc).is_none());
    if let Some(e) = doc.get_mut(&id) {
        e.scale = 2.0;
    }
    assert_eq!(hit_test(Point::new(150.0, 150.0), &doc), Some(id));
}
