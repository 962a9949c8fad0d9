use super::*;
use std::io::Cursor;

fn encoded_2x2() -> Arc<Image> {
    let img = ::image::RgbaImage::from_raw(2, 2, vec![200; 16]).unwrap();
    let mut buf = Vec::new();
    ::image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ::image::ImageFormat::Png)
        .unwrap();
    Image::from_bytes(buf).unwrap()
}

#[test]
fn pending_images_are_decoded_before_drawing() {
    let mut cache = RenderCache::new(false, true);
    let image = encoded_2x2();
    assert!(!image.is_decoded());
    cache.prepare_images(&[Arc::clone(&image)]);
    assert!(image.is_decoded());
    assert_eq!(image.byte_size(), 16);
    assert_eq!(cache.memory_usage(), 0);
}

#[test]
fn enabled_caches_keep_images_until_they_leave_the_stage() {
    let mut cache = RenderCache::new(true, true);
    let a = Image::from_pixels(1, 1, vec![255; 4]).unwrap();
    let b = Image::from_pixels(2, 1, vec![255; 8]).unwrap();
    cache.prepare_images(&[Arc::clone(&a), Arc::clone(&b), Arc::clone(&a)]);
    assert_eq!(cache.memory_usage(), 12);

    cache.begin_frame(&HashSet::from([b.unique_id()]));
    assert_eq!(cache.memory_usage(), 4);
    cache.release_all();
    assert_eq!(cache.memory_usage(), 0);
}

#[test]
fn telemetry_accumulates_within_a_frame() {
    let mut cache = RenderCache::new(true, true);
    cache.add_rendering_time(Duration::from_micros(30));
    cache.add_rendering_time(Duration::from_micros(12));
    cache.add_presenting_time(Duration::from_millis(2));
    assert_eq!(
        cache.telemetry(),
        FrameTelemetry {
            rendering_time: 42,
            image_decoding_time: 0,
            presenting_time: 2_000,
        }
    );
    cache.begin_frame(&HashSet::new());
    assert_eq!(cache.telemetry(), FrameTelemetry::default());
}
