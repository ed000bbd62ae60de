use std::path::Path;

use anyhow::Result;
use lector_ml::{DocumentFile, PredictorOptions, ocr_predictor};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

#[tokio::test]
#[ignore]
async fn reads_printed_words() -> Result<()> {
    let mut predictor =
        ocr_predictor("db_resnet50", "crnn_vgg16_bn", PredictorOptions::default()).await?;
    let pages = DocumentFile::from_images(&[fixture("hello.png")])?;

    let document = predictor.predict(&pages)?;

    assert_eq!(document.pages.len(), 1);
    assert_eq!(document.pages[0].dimensions, (136, 608));

    let text = document.render().to_uppercase();
    assert!(text.contains("HELLO"), "rendered: {text:?}");
    assert!(text.contains("WORLD"), "rendered: {text:?}");

    for word in document.words() {
        let g = word.geometry;
        assert!(0.0 <= g.xmin() && g.xmin() <= g.xmax() && g.xmax() <= 1.0, "{g:?}");
        assert!(0.0 <= g.ymin() && g.ymin() <= g.ymax() && g.ymax() <= 1.0, "{g:?}");
        assert!((0.0..=1.0).contains(&word.confidence));
    }

    Ok(())
}

#[tokio::test]
#[ignore]
async fn attention_head_and_blank_page() -> Result<()> {
    let mut predictor = ocr_predictor("linknet_resnet18", "parseq", PredictorOptions::default()).await?;
    let blank = image::DynamicImage::new_rgb8(320, 240);

    let document = predictor.predict(&[blank])?;

    assert_eq!(document.pages.len(), 1);
    assert!(document.pages[0].blocks.is_empty());
    assert_eq!(document.render(), "");

    let exported = document.export()?;
    assert_eq!(exported["pages"][0]["page_idx"], 0);
    assert_eq!(exported["pages"][0]["blocks"], serde_json::json!([]));

    Ok(())
}
