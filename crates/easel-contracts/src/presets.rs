use indexmap::IndexMap;

pub const DEFAULT_MODEL: &str = "black-forest-labs/FLUX.1-schnell";

/// A named suffix appended verbatim to the prompt to bias output aesthetics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylePreset {
    pub name: String,
    pub suffix: String,
}

/// A named (width, height) pair constraining the output raster dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeOption {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct StyleRegistry {
    styles: IndexMap<String, StylePreset>,
}

impl StyleRegistry {
    pub fn new(styles: Option<IndexMap<String, StylePreset>>) -> Self {
        Self {
            styles: styles.unwrap_or_else(default_styles),
        }
    }

    pub fn get(&self, name: &str) -> Option<&StylePreset> {
        self.styles.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }

    pub fn list(&self) -> impl Iterator<Item = &StylePreset> {
        self.styles.values()
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

#[derive(Debug, Clone)]
pub struct SizeRegistry {
    sizes: IndexMap<String, SizeOption>,
}

impl SizeRegistry {
    pub fn new(sizes: Option<IndexMap<String, SizeOption>>) -> Self {
        Self {
            sizes: sizes.unwrap_or_else(default_sizes),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SizeOption> {
        self.sizes.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sizes.keys().cloned().collect()
    }

    pub fn list(&self) -> impl Iterator<Item = &SizeOption> {
        self.sizes.values()
    }
}

impl Default for SizeRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

fn default_styles() -> IndexMap<String, StylePreset> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, suffix: &str| {
        map.insert(
            name.to_string(),
            StylePreset {
                name: name.to_string(),
                suffix: suffix.to_string(),
            },
        );
    };

    insert("None", "");
    insert(
        "Anime",
        ", anime style, vibrant colors, Studio Ghibli inspired, detailed illustration, hand-drawn aesthetic",
    );
    insert(
        "Realistic",
        ", photorealistic, highly detailed, 8K resolution, professional photography, sharp focus, natural lighting",
    );
    insert(
        "Digital Art",
        ", digital painting, artstation trending, concept art, smooth illustration, professional digital art",
    );
    insert(
        "Watercolor",
        ", watercolor painting, soft colors, artistic, gentle brushstrokes, traditional art style",
    );
    insert(
        "Oil Painting",
        ", oil painting, classical art style, textured brushwork, rich colors, fine art",
    );
    insert(
        "Cyberpunk",
        ", cyberpunk style, neon lights, futuristic, sci-fi, dystopian, high contrast, dark atmosphere",
    );
    insert(
        "Fantasy",
        ", fantasy art, magical, enchanted, epic, mystical atmosphere, otherworldly, detailed fantasy illustration",
    );

    map
}

fn default_sizes() -> IndexMap<String, SizeOption> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, width: u32, height: u32| {
        map.insert(
            name.to_string(),
            SizeOption {
                name: name.to_string(),
                width,
                height,
            },
        );
    };

    insert("Square (512x512)", 512, 512);
    insert("Portrait (512x768)", 512, 768);
    insert("Landscape (768x512)", 768, 512);

    map
}

/// Curated prompts behind the "random prompt" action.
pub const INSPIRATION_PROMPTS: &[&str] = &[
    "A cyberpunk city at sunset with neon lights reflecting on wet streets",
    "A magical forest with glowing mushrooms and floating fireflies, fantasy art",
    "A cute robot reading a book in a cozy library, digital art",
    "An astronaut riding a horse on Mars, cinematic lighting",
    "A steampunk airship flying over snowy mountains at dawn",
    "A cat wearing a wizard hat casting sparkly spells, whimsical art",
    "A futuristic sports car racing through a neon tunnel, cyberpunk style",
    "A cozy treehouse in autumn with warm golden lighting, studio ghibli style",
    "A friendly dragon sleeping on a pile of ancient books, fantasy illustration",
    "An underwater city with bioluminescent plants and glass domes",
    "A phoenix rising from flames against a starry night sky, epic art",
    "A samurai standing in a field of cherry blossoms, dramatic lighting",
    "A floating island with waterfalls and ancient ruins, fantasy landscape",
    "A friendly ghost serving tea in a haunted Victorian mansion",
    "A cosmic whale swimming through a nebula filled with stars",
];

/// Quick-fill prompts shown alongside the form.
pub const EXAMPLE_PROMPTS: &[&str] = &[
    "A futuristic city skyline at night with neon lights and flying cars",
    "A cozy coffee shop interior with warm lighting and plants, watercolor style",
    "An astronaut riding a horse on Mars, photorealistic",
    "A magical forest with glowing mushrooms and fireflies, fantasy art",
    "A steampunk mechanical owl with brass gears and emerald eyes",
];
