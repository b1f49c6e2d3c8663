use std::cell::RefCell;
use std::rc::Rc;

use time::macros::date;
use tokio::sync::Notify;

use super::*;

// =============================================================
// Fakes
// =============================================================

/// Records what it was asked to paint and returns a blank image.
#[derive(Default)]
struct FakeTarget {
    live_seen: RefCell<Option<RenderNode>>,
    clone_seen: RefCell<Option<RenderNode>>,
    options_seen: RefCell<Option<CaptureOptions>>,
    fail: bool,
    gate: Option<Rc<Notify>>,
}

#[async_trait(?Send)]
impl RenderTarget for FakeTarget {
    async fn snapshot(&self, root: &RenderNode, options: &CaptureOptions) -> Result<RasterImage, RasterError> {
        *self.live_seen.borrow_mut() = Some(root.clone());
        let mut copy = root.clone();
        (options.on_clone)(&mut copy);
        *self.clone_seen.borrow_mut() = Some(copy);
        *self.options_seen.borrow_mut() = Some(*options);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(RasterError::Failed("boom".into()));
        }
        Ok(RasterImage::new(4, 3))
    }
}

#[derive(Default)]
struct FakeSink {
    delivered: RefCell<Vec<(String, usize)>>,
    fail: bool,
}

impl DownloadSink for FakeSink {
    fn deliver(&self, filename: &str, png: &[u8]) -> std::io::Result<()> {
        if self.fail {
            return Err(std::io::Error::other("disk full"));
        }
        self.delivered.borrow_mut().push((filename.to_owned(), png.len()));
        Ok(())
    }
}

fn surface() -> RenderNode {
    let mut root = RenderNode::new(NodeKind::Surface, Rect::new(0.0, 0.0, 800.0, 600.0));
    let mut child = RenderNode::new(NodeKind::Decoration, Rect::new(10.0, 10.0, 100.0, 100.0));
    child.style = Style {
        background: Some("oklch(0.7 0.1 200)".into()),
        color: Some("#000000".into()),
        border_color: Some("oklch(0.5 0.2 30 / 50%)".into()),
    };
    root.children.push(child);
    root
}

fn today() -> Date {
    date!(2026 - 10 - 16)
}

// =============================================================
// Color sanitization
// =============================================================

#[test]
fn detects_wide_gamut_models() {
    assert!(is_unsupported_color("oklch(0.7 0.1 200)"));
    assert!(is_unsupported_color("OKLAB(0.5 0.1 0.1)"));
    assert!(is_unsupported_color("lab(50% 40 59)"));
    assert!(is_unsupported_color("lch(52% 72 50)"));
    assert!(is_unsupported_color("color(display-p3 1 0 0)"));
    assert!(!is_unsupported_color("#ff0000"));
    assert!(!is_unsupported_color("rgba(0, 0, 0, 0.5)"));
    assert!(!is_unsupported_color("transparent"));
}

#[test]
fn sanitize_rewrites_each_channel_independently() {
    let mut style = Style {
        background: Some("oklch(1 0 0)".into()),
        color: Some("#123456".into()),
        border_color: None,
    };
    sanitize_style(&mut style);
    assert_eq!(style.background.as_deref(), Some("rgba(255, 255, 255, 0.1)"));
    assert_eq!(style.color.as_deref(), Some("#123456"));
    assert!(style.border_color.is_none());

    let mut style = Style {
        background: None,
        color: Some("lch(50% 10 10)".into()),
        border_color: Some("color(display-p3 0 1 0)".into()),
    };
    sanitize_style(&mut style);
    assert!(style.background.is_none());
    assert_eq!(style.color.as_deref(), Some("#333333"));
    assert_eq!(style.border_color.as_deref(), Some("#cccccc"));
}

#[test]
fn sanitize_colors_walks_whole_tree() {
    let mut root = surface();
    root.style.color = Some("oklch(0 0 0)".into());
    root.children[0].children.push(surface());
    sanitize_colors(&mut root);
    let mut leftovers = 0;
    root.walk(&mut |n| {
        for c in [&n.style.background, &n.style.color, &n.style.border_color].into_iter().flatten() {
            if is_unsupported_color(c) {
                leftovers += 1;
            }
        }
    });
    assert_eq!(leftovers, 0);
}

// =============================================================
// Filename / watermark
// =============================================================

#[test]
fn filename_with_identifier() {
    let name = export_filename("3-501", today());
    assert_eq!(name, "宿舍_3-501_桌面设计_2026-10-16.png");
    assert!(name.contains("3-501"));
    assert!(name.ends_with("2026-10-16.png"));
}

#[test]
fn filename_without_identifier() {
    assert_eq!(export_filename("", today()), "桌面设计_2026-10-16.png");
    assert_eq!(export_filename("   ", today()), "桌面设计_2026-10-16.png");
}

#[test]
fn filename_strips_path_separators() {
    assert_eq!(export_filename("3/501", today()), "宿舍_3_501_桌面设计_2026-10-16.png");
}

#[test]
fn watermark_node_is_inert_and_on_top() {
    let node = watermark_node("3-501", 800.0);
    assert_eq!(node.kind, NodeKind::Watermark);
    assert_eq!(node.text.as_deref(), Some("宿舍号：3-501"));
    assert_eq!(node.z_index, 9999);
    assert!(!node.interactive);
    let center = node.rect.x + node.rect.width / 2.0;
    assert!((center - 382.4).abs() < 1e-9);
}

#[test]
fn capture_options_default() {
    let opts = CaptureOptions::default();
    assert!((opts.scale - 2.0).abs() < f64::EPSILON);
    assert!(opts.allow_cross_origin);
    assert!(opts.allow_taint);
    assert!(opts.transparent_background);
}

#[test]
fn error_codes_and_messages() {
    assert_eq!(ExportError::PreconditionFailed.error_code(), "E_NOT_READY");
    assert_eq!(ExportError::Busy.error_code(), "E_BUSY");
    assert!(!ExportError::RasterizationFailed(RasterError::Failed("x".into())).user_message().is_empty());
}

#[test]
fn encode_png_has_signature() {
    let png = encode_png(&RasterImage::new(2, 2)).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
}

// =============================================================
// Pipeline
// =============================================================

#[tokio::test]
async fn export_without_surface_fails_fast() {
    let exporter = Exporter::new(FakeTarget::default(), FakeSink::default());
    let err = exporter.export(None, "3-501", today()).await.unwrap_err();
    assert!(matches!(err, ExportError::PreconditionFailed));
    assert!(exporter.target().live_seen.borrow().is_none());
    assert!(exporter.sink().delivered.borrow().is_empty());
    assert!(!exporter.is_busy());
}

#[tokio::test]
async fn export_success_delivers_png() {
    let exporter = Exporter::new(FakeTarget::default(), FakeSink::default());
    let mut s = surface();
    let artifact = exporter.export(Some(&mut s), "3-501", today()).await.unwrap();
    assert_eq!(artifact.filename, "宿舍_3-501_桌面设计_2026-10-16.png");
    assert_eq!((artifact.width, artifact.height), (4, 3));
    assert_eq!(&artifact.png[..4], b"\x89PNG");
    let delivered = exporter.sink().delivered.borrow();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, artifact.filename);
}

#[tokio::test]
async fn export_injects_watermark_only_during_capture() {
    let exporter = Exporter::new(FakeTarget::default(), FakeSink::default());
    let mut s = surface();
    let before = s.clone();
    exporter.export(Some(&mut s), "3-501", today()).await.unwrap();

    let seen = exporter.target().live_seen.borrow().clone().unwrap();
    assert_eq!(seen.count_kind(NodeKind::Watermark), 1);
    let mark = seen.children.iter().find(|n| n.kind == NodeKind::Watermark).unwrap();
    assert_eq!(mark.text.as_deref(), Some("宿舍号：3-501"));
    assert_eq!(s, before);
}

#[tokio::test]
async fn export_without_identifier_has_no_watermark() {
    let exporter = Exporter::new(FakeTarget::default(), FakeSink::default());
    let mut s = surface();
    let artifact = exporter.export(Some(&mut s), "", today()).await.unwrap();
    let seen = exporter.target().live_seen.borrow().clone().unwrap();
    assert_eq!(seen.count_kind(NodeKind::Watermark), 0);
    assert_eq!(artifact.filename, "桌面设计_2026-10-16.png");
}

#[tokio::test]
async fn export_sanitizes_clone_not_live_tree() {
    let exporter = Exporter::new(FakeTarget::default(), FakeSink::default());
    let mut s = surface();
    exporter.export(Some(&mut s), "", today()).await.unwrap();
    let cloned = exporter.target().clone_seen.borrow().clone().unwrap();
    assert_eq!(cloned.children[0].style.background.as_deref(), Some("rgba(255, 255, 255, 0.1)"));
    assert_eq!(cloned.children[0].style.color.as_deref(), Some("#000000"));
    assert_eq!(cloned.children[0].style.border_color.as_deref(), Some("#cccccc"));
    assert_eq!(s.children[0].style.background.as_deref(), Some("oklch(0.7 0.1 200)"));
}

#[tokio::test]
async fn export_passes_capture_options() {
    let exporter = Exporter::new(FakeTarget::default(), FakeSink::default());
    let mut s = surface();
    exporter.export(Some(&mut s), "", today()).await.unwrap();
    let opts = exporter.target().options_seen.borrow().unwrap();
    assert!((opts.scale - 2.0).abs() < f64::EPSILON);
    assert!(opts.transparent_background);
    assert!(opts.allow_cross_origin);
}

#[tokio::test]
async fn export_failure_cleans_up_and_delivers_nothing() {
    let target = FakeTarget { fail: true, ..Default::default() };
    let exporter = Exporter::new(target, FakeSink::default());
    let mut s = surface();
    let before = s.clone();
    let err = exporter.export(Some(&mut s), "3-501", today()).await.unwrap_err();
    assert!(matches!(err, ExportError::RasterizationFailed(_)));
    assert_eq!(s, before);
    assert!(exporter.sink().delivered.borrow().is_empty());
    assert!(!exporter.is_busy());
}

#[tokio::test]
async fn export_delivery_failure_is_reported() {
    let sink = FakeSink { fail: true, ..Default::default() };
    let exporter = Exporter::new(FakeTarget::default(), sink);
    let mut s = surface();
    let err = exporter.export(Some(&mut s), "", today()).await.unwrap_err();
    assert!(matches!(err, ExportError::Delivery(_)));
    assert!(!exporter.is_busy());
}

#[tokio::test]
async fn overlapping_export_is_rejected_busy() {
    let gate = Rc::new(Notify::new());
    let target = FakeTarget { gate: Some(gate.clone()), ..Default::default() };
    let exporter = Exporter::new(target, FakeSink::default());
    let mut first_surface = surface();
    let mut second_surface = surface();

    let first = exporter.export(Some(&mut first_surface), "a", today());
    tokio::pin!(first);
    tokio::select! {
        biased;
        _ = &mut first => panic!("first export should be parked on the gate"),
        () = tokio::task::yield_now() => {}
    }
    assert!(exporter.is_busy());

    let second = exporter.export(Some(&mut second_surface), "b", today()).await;
    assert!(matches!(second, Err(ExportError::Busy)));
    assert_eq!(second_surface, surface());

    gate.notify_one();
    assert!(first.await.is_ok());
    assert_eq!(exporter.sink().delivered.borrow().len(), 1);
    assert!(!exporter.is_busy());
}

#[tokio::test]
async fn dropped_export_releases_flag_and_watermark() {
    let gate = Rc::new(Notify::new());
    let target = FakeTarget { gate: Some(gate), ..Default::default() };
    let exporter = Exporter::new(target, FakeSink::default());
    let mut s = surface();
    let before = s.clone();
    {
        let fut = exporter.export(Some(&mut s), "3-501", today());
        tokio::pin!(fut);
        tokio::select! {
            biased;
            _ = &mut fut => panic!("export should be parked on the gate"),
            () = tokio::task::yield_now() => {}
        }
        assert!(exporter.is_busy());
    }
    assert!(!exporter.is_busy());
    assert_eq!(s, before);
}
