//! Precache manifests
//!
//! Paths seeded at install time, relative to the proxy origin.

/// Shell documents, styles, scripts and icons
pub const STATIC_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/galleries.html",
    "/css/styles.css",
    "/css/bootstrap-custom.css",
    "/css/portfolio.css",
    "/css/footer.css",
    "/css/responsive.css",
    "/css/image-optimizer.css",
    "/js/script.js",
    "/js/translations.js",
    "/js/image-optimizer.js",
    "/js/image-thumbnails.js",
    "/js/progressive-loader.js",
    "/js/background-music.js",
    "/assets/favicon/favicon-96x96.png",
    "/assets/favicon/favicon.svg",
    "/assets/favicon/favicon.ico",
    "/assets/favicon/apple-touch-icon.png",
    "/assets/favicon/site.webmanifest",
];

/// Gallery images
pub const GALLERY_IMAGES: &[&str] = &[
    "/assets/images/Photo.1.webp",
    "/assets/images/Photo.2.webp",
    "/assets/images/Photo.3.webp",
    "/assets/images/Photo.5.webp",
    "/assets/images/ST1.webp",
    "/assets/images/ST2.webp",
    "/assets/images/ST3.webp",
    "/assets/images/rsmval1.PNG",
    "/assets/images/rsmval2.PNG",
    "/assets/images/rsmval3.PNG",
    "/assets/images/1.jpg",
    "/assets/images/2.jpg",
    "/assets/images/3.jpg",
    "/assets/images/4.jpg",
    "/assets/images/5.jpg",
    "/assets/images/6.jpg",
    "/assets/images/7.jpg",
    "/assets/images/8.jpg",
    "/assets/images/9.jpg",
    "/assets/images/10.jpg",
    "/assets/images/11.jpg",
    "/assets/images/12.jpg",
    "/assets/images/13.jpg",
    "/assets/images/14.jpg",
    "/assets/images/15.jpg",
    "/assets/images/20.jpg",
    "/assets/images/rsm1.PNG",
    "/assets/images/rsm2.PNG",
    "/assets/images/rsm3u.jpg",
    "/assets/images/rsm4.PNG",
    "/assets/images/rsm5.PNG",
    "/assets/images/rsm6u.jpg",
    "/assets/images/rsm7.PNG",
    "/assets/images/rsm8.jpg",
];

pub(crate) fn owned(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}
