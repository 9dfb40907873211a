//! Landing page: a shuffled grid of hosted sample images, each loaded
//! through the gateway's own fetch proxy.

use crate::error::GatewayError;
use minijinja::Environment;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

pub const IMAGE_BASE_URL: &str = "https://res.cloudinary.com/demo/image/upload/w_300,h_200,c_fill/";

pub const SAMPLE_IMAGES: &[&str] = &[
    "sample.jpg",
    "kitten.jpg",
    "dog.jpg",
    "bird.jpg",
    "landscape.jpg",
    "cat.jpg",
    "flowers.jpg",
    "beach.jpg",
    "coffee.jpg",
    "car.jpg",
    "mountain.jpg",
    "tree.jpg",
    "food.jpg",
    "sunset.jpg",
    "waterfall.jpg",
    "city.jpg",
    "forest.jpg",
    "bridge.jpg",
    "boat.jpg",
    "house.jpg",
];

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryImage {
    pub url: String,
    /// File stem shown under the tile
    pub name: String,
}

impl GalleryImage {
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = image_name(&url);
        Self { url, name }
    }
}

/// `.../upload/w_300/kitten.jpg` -> `kitten`
fn image_name(url: &str) -> String {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let file = path.rsplit('/').next().unwrap_or_default();
    file.split('.').next().unwrap_or_default().to_string()
}

pub fn sample_images() -> Vec<GalleryImage> {
    SAMPLE_IMAGES
        .iter()
        .map(|file| GalleryImage::from_url(format!("{}{}", IMAGE_BASE_URL, file)))
        .collect()
}

pub fn shuffled_images<R: Rng + ?Sized>(rng: &mut R) -> Vec<GalleryImage> {
    let mut images = sample_images();
    images.shuffle(rng);
    images
}

#[derive(Debug)]
pub struct GalleryPage {
    env: Environment<'static>,
}

impl GalleryPage {
    pub fn new() -> Result<Self, GatewayError> {
        let mut env = Environment::new();
        env.add_filter("urlencode", |value: String| {
            urlencoding::encode(&value).into_owned()
        });
        env.add_template("index.html", INDEX_TEMPLATE)
            .map_err(|e| GatewayError::Template(e.to_string()))?;
        Ok(Self { env })
    }

    pub fn render(&self, images: &[GalleryImage]) -> Result<String, GatewayError> {
        let template = self
            .env
            .get_template("index.html")
            .map_err(|e| GatewayError::Template(e.to_string()))?;
        template
            .render(minijinja::context! { images => images })
            .map_err(|e| GatewayError::Template(e.to_string()))
    }

    /// Render with a fresh shuffle
    pub fn render_shuffled(&self) -> Result<String, GatewayError> {
        let images = shuffled_images(&mut rand::thread_rng());
        self.render(&images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_names_are_file_stems() {
        let images = sample_images();
        assert_eq!(images.len(), 20);
        assert_eq!(images[1].name, "kitten");
        assert_eq!(
            images[1].url,
            "https://res.cloudinary.com/demo/image/upload/w_300,h_200,c_fill/kitten.jpg"
        );
    }

    #[test]
    fn test_shuffle_keeps_every_image() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut shuffled = shuffled_images(&mut rng);
        let mut original = sample_images();
        shuffled.sort_by(|a, b| a.name.cmp(&b.name));
        original.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(shuffled, original);
    }

    #[test]
    fn test_page_links_thumbnails_through_fetch() {
        let page = GalleryPage::new().unwrap();
        let html = page.render(&sample_images()[..2]).unwrap();

        assert!(html.contains(
            "/fetch?url=https%3A%2F%2Fres.cloudinary.com%2Fdemo%2Fimage%2Fupload%2Fw_300%2Ch_200%2Cc_fill%2Fsample.jpg"
        ));
        assert!(html.contains("<span>kitten</span>"));
        assert!(!html.contains("dog"));
    }

    #[test]
    fn test_names_are_escaped() {
        let page = GalleryPage::new().unwrap();
        let html = page
            .render(&[GalleryImage {
                url: "https://res.cloudinary.com/x.jpg".into(),
                name: "<b>x</b>".into(),
            }])
            .unwrap();
        assert!(html.contains("<span>&lt;b&gt;x&lt;"));
        assert!(!html.contains("<b>x"));
    }
}
