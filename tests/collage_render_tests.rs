use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use snap_grid::card::{ImageRef, PhotoMap, PromptList, SlotIndex, CELL_COUNT};
use snap_grid::collage::loader::encode_data_url;
use snap_grid::collage::{
    CollageRenderer, FontLibrary, LoadedImage, RenderOptions, Unavailable, PLACEHOLDER_FILL,
};

const RED: Rgba<u8> = Rgba([220, 30, 30, 255]);
const BLUE: Rgba<u8> = Rgba([20, 40, 200, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn solid_data_url(width: u32, height: u32, color: Rgba<u8>) -> ImageRef {
    let image = RgbaImage::from_pixel(width, height, color);
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    ImageRef::DataUrl(encode_data_url("image/png", &bytes))
}

fn assert_close(actual: Rgba<u8>, expected: Rgba<u8>) {
    for c in 0..4 {
        let diff = (actual.0[c] as i16 - expected.0[c] as i16).abs();
        assert!(diff <= 2, "expected {:?}, got {:?}", expected, actual);
    }
}

fn renderer() -> CollageRenderer {
    CollageRenderer::new(FontLibrary::bitmap_only())
}

fn decode(png: &[u8]) -> RgbaImage {
    image::load_from_memory(png).unwrap().to_rgba8()
}

fn absent_cells() -> Vec<LoadedImage> {
    (0..CELL_COUNT)
        .map(|_| LoadedImage::Unavailable(Unavailable::Absent))
        .collect()
}

#[tokio::test]
async fn test_single_photo_with_logo() {
    let mut photos = PhotoMap::new();
    photos.insert(SlotIndex::new(0).unwrap(), solid_data_url(40, 40, RED));
    let logo = solid_data_url(30, 30, BLUE);
    let options = RenderOptions::default();

    let result = renderer()
        .render(&photos, Some(&logo), &PromptList::default(), &options)
        .await
        .unwrap();
    assert_eq!((result.width, result.height), (1104, 1104));

    let canvas = decode(&result.png);
    assert_eq!(canvas.dimensions(), (1104, 1104));

    // Border and gap keep the background
    assert_eq!(*canvas.get_pixel(5, 5), WHITE);
    assert_eq!(*canvas.get_pixel(370, 100), WHITE);

    // Cell 0 photo, cell 4 logo, everything else placeholder
    assert_close(*canvas.get_pixel(188, 188), RED);
    assert_close(*canvas.get_pixel(552, 552), BLUE);
    for (x, y) in [(552, 188), (916, 188), (188, 552), (916, 552), (188, 916), (916, 916)] {
        assert_eq!(*canvas.get_pixel(x, y), PLACEHOLDER_FILL.0);
    }
}

#[tokio::test]
async fn test_cells_match_grid_geometry() {
    let photos: PhotoMap = SlotIndex::all()
        .map(|slot| (slot, solid_data_url(10, 10, RED)))
        .collect();
    let options = RenderOptions::default();
    let result = renderer()
        .render(&photos, None, &PromptList::default(), &options)
        .await
        .unwrap();
    let canvas = decode(&result.png);

    for (index, cell) in options.layout().cells() {
        let expected = if index == 4 { PLACEHOLDER_FILL.0 } else { RED };
        let corners = [
            (cell.x, cell.y),
            (cell.x + cell.width - 1, cell.y),
            (cell.x, cell.y + cell.height - 1),
            (cell.x + cell.width - 1, cell.y + cell.height - 1),
        ];
        for (x, y) in corners {
            assert_close(*canvas.get_pixel(x, y), expected);
        }
        // One pixel outside the cell is border or gap
        assert_eq!(*canvas.get_pixel(cell.x + cell.width, cell.y), WHITE);
        assert_eq!(*canvas.get_pixel(cell.x, cell.y + cell.height), WHITE);
    }
}

#[tokio::test]
async fn test_render_is_deterministic() {
    let mut photos = PhotoMap::new();
    photos.insert(SlotIndex::new(2).unwrap(), solid_data_url(64, 16, RED));
    photos.insert(SlotIndex::new(7).unwrap(), solid_data_url(16, 64, BLUE));
    let options = RenderOptions {
        draw_labels: true,
        ..RenderOptions::default()
    };

    let first = renderer()
        .render(&photos, None, &PromptList::default(), &options)
        .await
        .unwrap();
    let second = renderer()
        .render(&photos, None, &PromptList::default(), &options)
        .await
        .unwrap();
    assert_eq!(first.digest(), second.digest());
    assert_eq!(first.base64, second.base64);
}

#[tokio::test]
async fn test_broken_photo_falls_back_to_placeholder() {
    let mut photos = PhotoMap::new();
    photos.insert(
        SlotIndex::new(0).unwrap(),
        ImageRef::DataUrl(encode_data_url("image/png", b"corrupt")),
    );
    photos.insert(SlotIndex::new(1).unwrap(), solid_data_url(8, 8, RED));

    let result = renderer()
        .render(&photos, None, &PromptList::default(), &RenderOptions::default())
        .await
        .unwrap();
    let canvas = decode(&result.png);
    assert_eq!(*canvas.get_pixel(188, 188), PLACEHOLDER_FILL.0);
    assert_close(*canvas.get_pixel(552, 188), RED);
}

#[test]
fn test_two_line_label_box() {
    let mut prompts: Vec<String> = vec![String::new(); CELL_COUNT];
    prompts[0] = "Reduce plastic waste today".to_string();
    let prompts = PromptList::new(prompts);
    let options = RenderOptions {
        draw_labels: true,
        ..RenderOptions::default()
    };

    let canvas = renderer().paint(&absent_cells(), &prompts, &options);

    // Cell 0 spans y 12..364; two lines of 22px plus 2 * 8px padding = 60px
    let cell_bottom = 364;
    assert_eq!(*canvas.get_pixel(14, cell_bottom - 61), PLACEHOLDER_FILL.0);
    let shaded = *canvas.get_pixel(14, cell_bottom - 60);
    assert!(shaded.0[0] < PLACEHOLDER_FILL.0 .0[0]);
    assert_eq!(shaded, *canvas.get_pixel(14, cell_bottom - 1));

    // First line text starts at the padded left edge
    let first_line_has_text = (316..332)
        .any(|y| (20..36).any(|x| *canvas.get_pixel(x, y) == WHITE));
    assert!(first_line_has_text);
    // Second line ("today") sits 22px lower
    let second_line_has_text = (338..354)
        .any(|y| (20..100).any(|x| *canvas.get_pixel(x, y) == WHITE));
    assert!(second_line_has_text);

    // Other cells have no label, the logo cell never does
    assert_eq!(*canvas.get_pixel(378, cell_bottom - 1), PLACEHOLDER_FILL.0);
}

#[test]
fn test_labels_disabled() {
    let options = RenderOptions::default();
    let canvas = renderer().paint(&absent_cells(), &PromptList::default(), &options);
    assert_eq!(*canvas.get_pixel(14, 363), PLACEHOLDER_FILL.0);
}
