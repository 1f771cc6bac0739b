//! Ordered, id-keyed image collection.

use std::collections::HashMap;

use shared::domain::{GeneratedImage, ImageId};

/// Images keyed by id with their display order kept alongside, so an
/// asynchronous completion can look its entry up by id after the collection
/// has been replaced underneath it.
#[derive(Debug, Default, Clone)]
pub struct ImageGallery {
    order: Vec<ImageId>,
    entries: HashMap<ImageId, GeneratedImage>,
}

impl ImageGallery {
    pub fn replace_all(&mut self, images: impl IntoIterator<Item = GeneratedImage>) {
        self.clear();
        for image in images {
            if self.entries.contains_key(&image.id) {
                continue;
            }
            self.order.push(image.id.clone());
            self.entries.insert(image.id.clone(), image);
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    pub fn get(&self, id: &ImageId) -> Option<&GeneratedImage> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &ImageId) -> Option<&mut GeneratedImage> {
        self.entries.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedImage> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn to_vec(&self) -> Vec<GeneratedImage> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::GenerationOptions;

    fn image(id: &str, source: &str) -> GeneratedImage {
        GeneratedImage::new(
            ImageId(id.to_string()),
            source,
            "prompt",
            GenerationOptions::default(),
        )
    }

    #[test]
    fn keeps_insertion_order_after_in_place_update() {
        let mut gallery = ImageGallery::default();
        gallery.replace_all([image("b", "one"), image("a", "two"), image("c", "three")]);

        gallery
            .get_mut(&ImageId("a".into()))
            .expect("entry")
            .source = "updated".into();

        let sources: Vec<_> = gallery.iter().map(|img| img.source.as_str()).collect();
        assert_eq!(sources, ["one", "updated", "three"]);
    }

    #[test]
    fn replace_all_drops_previous_entries() {
        let mut gallery = ImageGallery::default();
        gallery.replace_all([image("old", "x")]);
        gallery.replace_all([image("new", "y")]);

        assert!(gallery.get(&ImageId("old".into())).is_none());
        assert_eq!(gallery.len(), 1);
    }
}
