use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Style {
    Moderne,
    Scandinave,
    Industriel,
    Boheme,
    Classique,
    Minimaliste,
    Japandi,
    ArtDeco,
}

#[derive(Clone, Copy, Debug)]
struct StyleSpec {
    style: Style,
    label: &'static str,
    slug: &'static str,
    descriptor: &'static str,
}

const STYLES: &[StyleSpec] = &[
    StyleSpec {
        style: Style::Moderne,
        label: "Moderne",
        slug: "moderne",
        descriptor: "clean lines, sleek furniture, uncluttered surfaces",
    },
    StyleSpec {
        style: Style::Scandinave,
        label: "Scandinave",
        slug: "scandinave",
        descriptor: "light woods, soft textiles, bright and airy feel",
    },
    StyleSpec {
        style: Style::Industriel,
        label: "Industriel",
        slug: "industriel",
        descriptor: "exposed brick, black metal, raw concrete accents",
    },
    StyleSpec {
        style: Style::Boheme,
        label: "Bohème",
        slug: "boheme",
        descriptor: "layered rugs, rattan, plants and eclectic patterns",
    },
    StyleSpec {
        style: Style::Classique,
        label: "Classique",
        slug: "classique",
        descriptor: "moldings, symmetrical layout, timeless furniture",
    },
    StyleSpec {
        style: Style::Minimaliste,
        label: "Minimaliste",
        slug: "minimaliste",
        descriptor: "essential furniture only, hidden storage, calm negative space",
    },
    StyleSpec {
        style: Style::Japandi,
        label: "Japandi",
        slug: "japandi",
        descriptor: "low furniture, natural fibers, wabi-sabi simplicity",
    },
    StyleSpec {
        style: Style::ArtDeco,
        label: "Art Déco",
        slug: "art-deco",
        descriptor: "geometric motifs, brass details, velvet upholstery",
    },
];

impl Style {
    pub const ALL: [Style; 8] = [
        Style::Moderne,
        Style::Scandinave,
        Style::Industriel,
        Style::Boheme,
        Style::Classique,
        Style::Minimaliste,
        Style::Japandi,
        Style::ArtDeco,
    ];

    /// Exact match on the wire label.
    pub fn from_label(raw: &str) -> Option<Self> {
        STYLES
            .iter()
            .find(|spec| spec.label == raw)
            .map(|spec| spec.style)
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn slug(self) -> &'static str {
        self.spec().slug
    }

    pub fn descriptor(self) -> &'static str {
        self.spec().descriptor
    }

    /// Catalog position; the mock rotation keys on it.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn labels() -> Vec<&'static str> {
        STYLES.iter().map(|spec| spec.label).collect()
    }

    fn spec(self) -> &'static StyleSpec {
        // STYLES lists every variant in declaration order.
        &STYLES[self.ordinal()]
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Palette {
    Neutre,
    Chaude,
    Froide,
    Pastel,
    Terre,
    Monochrome,
    Sombre,
    Naturelle,
}

const PALETTES: &[(Palette, &str, &str)] = &[
    (Palette::Neutre, "Neutre", "whites, beiges and soft greys"),
    (Palette::Chaude, "Chaude", "terracotta, ochre and warm reds"),
    (Palette::Froide, "Froide", "blues, greens and cool greys"),
    (Palette::Pastel, "Pastel", "powder pink, mint and pale lavender"),
    (Palette::Terre, "Terre", "clay, sand and olive"),
    (Palette::Monochrome, "Monochrome", "black, white and greys"),
    (Palette::Sombre, "Sombre", "charcoal, navy and deep green"),
    (Palette::Naturelle, "Naturelle", "wood tones, linen and stone"),
];

impl Palette {
    pub const ALL: [Palette; 8] = [
        Palette::Neutre,
        Palette::Chaude,
        Palette::Froide,
        Palette::Pastel,
        Palette::Terre,
        Palette::Monochrome,
        Palette::Sombre,
        Palette::Naturelle,
    ];

    pub fn from_label(raw: &str) -> Option<Self> {
        PALETTES
            .iter()
            .find(|(_, label, _)| *label == raw)
            .map(|(palette, _, _)| *palette)
    }

    pub fn label(self) -> &'static str {
        PALETTES[self as usize].1
    }

    pub fn colors(self) -> &'static str {
        PALETTES[self as usize].2
    }

    pub fn labels() -> Vec<&'static str> {
        PALETTES.iter().map(|(_, label, _)| *label).collect()
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
