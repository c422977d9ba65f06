//! A minimal tiled GeoTIFF writer so tests don't depend on binary fixtures.
//!
//! Produces single band (or replicated multi-sample) north-up rasters, classic TIFF or
//! BigTIFF, in either byte order, with an optional 2x overview.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl SampleKind {
    pub fn size(&self) -> usize {
        match self {
            SampleKind::U8 | SampleKind::I8 => 1,
            SampleKind::U16 | SampleKind::I16 => 2,
            SampleKind::U32 | SampleKind::I32 | SampleKind::F32 => 4,
            SampleKind::F64 => 8,
        }
    }

    fn sample_format(&self) -> u16 {
        match self {
            SampleKind::U8 | SampleKind::U16 | SampleKind::U32 => 1,
            SampleKind::I8 | SampleKind::I16 | SampleKind::I32 => 2,
            SampleKind::F32 | SampleKind::F64 => 3,
        }
    }

    fn is_float(&self) -> bool {
        self.sample_format() == 3
    }
}

/// Turns uncompressed tile bytes into what gets written to the file
pub type TileEncoder = fn(&[u8]) -> Vec<u8>;

struct Writer {
    big_endian: bool,
}

impl Writer {
    fn u16s(&self, values: &[u16]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() })
            .collect()
    }

    fn u32s(&self, values: &[u32]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() })
            .collect()
    }

    fn u64s(&self, values: &[u64]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() })
            .collect()
    }

    fn f64s(&self, values: &[f64]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() })
            .collect()
    }

    fn bytes<const N: usize>(&self, le: [u8; N], be: [u8; N]) -> [u8; N] {
        if self.big_endian {
            be
        } else {
            le
        }
    }

    fn sample(&self, kind: SampleKind, v: f64, out: &mut Vec<u8>) {
        match kind {
            SampleKind::U8 => out.push(v as u8),
            SampleKind::I8 => out.push(v as i8 as u8),
            SampleKind::U16 => out.extend(self.bytes((v as u16).to_le_bytes(), (v as u16).to_be_bytes())),
            SampleKind::I16 => out.extend(self.bytes((v as i16).to_le_bytes(), (v as i16).to_be_bytes())),
            SampleKind::U32 => out.extend(self.bytes((v as u32).to_le_bytes(), (v as u32).to_be_bytes())),
            SampleKind::I32 => out.extend(self.bytes((v as i32).to_le_bytes(), (v as i32).to_be_bytes())),
            SampleKind::F32 => out.extend(self.bytes((v as f32).to_le_bytes(), (v as f32).to_be_bytes())),
            SampleKind::F64 => out.extend(self.bytes(v.to_le_bytes(), v.to_be_bytes())),
        }
    }

    // Integer samples through i64 so horizontal differences wrap like the decoder expects
    fn int_sample(&self, kind: SampleKind, v: i64, out: &mut Vec<u8>) {
        match kind {
            SampleKind::U8 | SampleKind::I8 => out.push(v as u8),
            SampleKind::U16 | SampleKind::I16 => {
                out.extend(self.bytes((v as u16).to_le_bytes(), (v as u16).to_be_bytes()))
            }
            SampleKind::U32 | SampleKind::I32 => {
                out.extend(self.bytes((v as u32).to_le_bytes(), (v as u32).to_be_bytes()))
            }
            SampleKind::F32 | SampleKind::F64 => panic!("int_sample called with {:?}", kind),
        }
    }
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u64,
    data: Vec<u8>,
}

struct Image {
    width: usize,
    height: usize,
    values: Vec<f64>,
    is_overview: bool,
}

pub struct GeoTiffBuilder {
    width: usize,
    height: usize,
    kind: SampleKind,
    tile_width: usize,
    tile_height: usize,
    values: Vec<f64>,
    samples_per_pixel: u16,
    bigtiff: bool,
    big_endian: bool,
    nodata: Option<String>,
    origin: (f64, f64),
    resolution: (f64, f64),
    epsg: u16,
    pixel_is_point: bool,
    compression: u16,
    encoder: Option<TileEncoder>,
    predictor: u16,
    overview: bool,
}

impl GeoTiffBuilder {
    /// Defaults: 16x16 tiles, all values 0, EPSG:32636 with a 10m grid at (500000, 4000000)
    pub fn new(width: usize, height: usize, kind: SampleKind) -> GeoTiffBuilder {
        GeoTiffBuilder {
            width,
            height,
            kind,
            tile_width: 16,
            tile_height: 16,
            values: vec![0.0; width * height],
            samples_per_pixel: 1,
            bigtiff: false,
            big_endian: false,
            nodata: None,
            origin: (500000.0, 4000000.0),
            resolution: (10.0, 10.0),
            epsg: 32636,
            pixel_is_point: false,
            compression: 1,
            encoder: None,
            predictor: 1,
            overview: false,
        }
    }

    pub fn tile_size(mut self, tile_width: usize, tile_height: usize) -> Self {
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self
    }

    /// Row-major pixel values, cast to the sample type when written
    pub fn values(mut self, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.width * self.height);
        self.values = values;
        self
    }

    pub fn samples_per_pixel(mut self, samples_per_pixel: u16) -> Self {
        self.samples_per_pixel = samples_per_pixel;
        self
    }

    pub fn bigtiff(mut self, bigtiff: bool) -> Self {
        self.bigtiff = bigtiff;
        self
    }

    pub fn big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = big_endian;
        self
    }

    pub fn nodata(mut self, nodata: &str) -> Self {
        self.nodata = Some(nodata.to_string());
        self
    }

    /// Upper left corner and (positive) pixel size of a north-up grid
    pub fn geotransform(mut self, ul_x: f64, ul_y: f64, x_res: f64, y_res: f64) -> Self {
        self.origin = (ul_x, ul_y);
        self.resolution = (x_res, y_res);
        self
    }

    pub fn epsg(mut self, epsg: u16) -> Self {
        self.epsg = epsg;
        self
    }

    pub fn pixel_is_point(mut self, pixel_is_point: bool) -> Self {
        self.pixel_is_point = pixel_is_point;
        self
    }

    pub fn compression(mut self, compression: u16, encoder: TileEncoder) -> Self {
        self.compression = compression;
        self.encoder = Some(encoder);
        self
    }

    pub fn predictor(mut self, predictor: u16) -> Self {
        self.predictor = predictor;
        self
    }

    /// Adds a 2x downsampled (nearest neighbour) overview IFD
    pub fn with_overview(mut self) -> Self {
        self.overview = true;
        self
    }

    fn encode_tile(&self, w: &Writer, image: &Image, tile_i: usize, tile_j: usize) -> Vec<u8> {
        let spp = self.samples_per_pixel as usize;
        let row_len = self.tile_width * spp;
        let mut out = Vec::with_capacity(row_len * self.tile_height * self.kind.size());
        for ti in 0..self.tile_height {
            let i = tile_i * self.tile_height + ti;
            let row: Vec<f64> = (0..self.tile_width)
                .flat_map(|tj| {
                    let j = tile_j * self.tile_width + tj;
                    let v = if i < image.height && j < image.width {
                        image.values[i * image.width + j]
                    } else {
                        0.0
                    };
                    std::iter::repeat(v).take(spp)
                })
                .collect();
            match self.predictor {
                1 => row.iter().for_each(|v| w.sample(self.kind, *v, &mut out)),
                2 => {
                    assert!(!self.kind.is_float(), "predictor 2 requires integer samples");
                    let ints: Vec<i64> = row.iter().map(|v| *v as i64).collect();
                    for k in 0..ints.len() {
                        let diff = if k < spp { ints[k] } else { ints[k] - ints[k - spp] };
                        w.int_sample(self.kind, diff, &mut out);
                    }
                }
                3 => {
                    assert!(self.kind.is_float(), "predictor 3 requires float samples");
                    let size = self.kind.size();
                    let be = Writer { big_endian: true };
                    let mut sample_bytes = vec![];
                    row.iter().for_each(|v| be.sample(self.kind, *v, &mut sample_bytes));
                    // Byte planes, most significant first, then byte-wise differencing
                    let mut planes = vec![0u8; row_len * size];
                    for s in 0..row_len {
                        for b in 0..size {
                            planes[b * row_len + s] = sample_bytes[s * size + b];
                        }
                    }
                    for k in (spp..planes.len()).rev() {
                        planes[k] = planes[k].wrapping_sub(planes[k - spp]);
                    }
                    out.extend(planes);
                }
                p => panic!("unsupported predictor {}", p),
            }
        }
        match self.encoder {
            Some(encoder) => encoder(&out),
            None => out,
        }
    }

    fn geo_key_directory(&self) -> Vec<u16> {
        let geographic = self.epsg == 4326;
        let mut keys: Vec<[u16; 4]> = vec![
            [1024, 0, 1, if geographic { 2 } else { 1 }],
            [1025, 0, 1, if self.pixel_is_point { 2 } else { 1 }],
        ];
        if geographic {
            keys.push([2048, 0, 1, self.epsg]);
            keys.push([2054, 0, 1, 9102]);
        } else {
            keys.push([3072, 0, 1, self.epsg]);
            keys.push([3076, 0, 1, 9001]);
        }
        let mut directory = vec![1, 1, 0, keys.len() as u16];
        keys.iter().for_each(|k| directory.extend_from_slice(k));
        directory
    }

    fn entries(&self, w: &Writer, image: &Image, tile_byte_counts: &[u64]) -> Vec<Entry> {
        let ntiles = tile_byte_counts.len();
        let spp = self.samples_per_pixel as usize;
        let mut entries = vec![];
        let short = |tag: u16, values: Vec<u16>| Entry {
            tag,
            field_type: 3,
            count: values.len() as u64,
            data: w.u16s(&values),
        };
        let long = |tag: u16, v: u32| Entry {
            tag,
            field_type: 4,
            count: 1,
            data: w.u32s(&[v]),
        };
        let offsets = |tag: u16, values: &[u64]| {
            if self.bigtiff {
                Entry {
                    tag,
                    field_type: 16,
                    count: values.len() as u64,
                    data: w.u64s(values),
                }
            } else {
                let values: Vec<u32> = values.iter().map(|v| *v as u32).collect();
                Entry {
                    tag,
                    field_type: 4,
                    count: values.len() as u64,
                    data: w.u32s(&values),
                }
            }
        };
        let doubles = |tag: u16, values: &[f64]| Entry {
            tag,
            field_type: 12,
            count: values.len() as u64,
            data: w.f64s(values),
        };

        if image.is_overview {
            entries.push(long(254, 1));
        }
        entries.push(long(256, image.width as u32));
        entries.push(long(257, image.height as u32));
        entries.push(short(258, vec![(self.kind.size() * 8) as u16; spp]));
        entries.push(short(259, vec![self.compression]));
        entries.push(short(262, vec![if spp == 3 { 2 } else { 1 }]));
        entries.push(short(277, vec![self.samples_per_pixel]));
        entries.push(short(284, vec![1]));
        if self.predictor != 1 {
            entries.push(short(317, vec![self.predictor]));
        }
        entries.push(long(322, self.tile_width as u32));
        entries.push(long(323, self.tile_height as u32));
        // Placeholder, patched once the layout is known
        entries.push(offsets(324, &vec![0; ntiles]));
        entries.push(offsets(325, tile_byte_counts));
        entries.push(short(339, vec![self.kind.sample_format(); spp]));
        if !image.is_overview {
            entries.push(doubles(33550, &[self.resolution.0, self.resolution.1, 0.0]));
            entries.push(doubles(
                33922,
                &[0.0, 0.0, 0.0, self.origin.0, self.origin.1, 0.0],
            ));
            entries.push(short(34735, self.geo_key_directory()));
        }
        if let Some(nodata) = &self.nodata {
            let mut data = nodata.as_bytes().to_vec();
            data.push(0);
            entries.push(Entry {
                tag: 42113,
                field_type: 2,
                count: data.len() as u64,
                data,
            });
        }
        entries
    }

    pub fn build(&self) -> Vec<u8> {
        let w = Writer {
            big_endian: self.big_endian,
        };
        let mut images = vec![Image {
            width: self.width,
            height: self.height,
            values: self.values.clone(),
            is_overview: false,
        }];
        if self.overview {
            let (ow, oh) = ((self.width + 1) / 2, (self.height + 1) / 2);
            let values = (0..oh)
                .flat_map(|i| (0..ow).map(move |j| (i, j)))
                .map(|(i, j)| self.values[2 * i * self.width + 2 * j])
                .collect();
            images.push(Image {
                width: ow,
                height: oh,
                values,
                is_overview: true,
            });
        }

        let (offset_size, count_size, entry_size, header_size) = if self.bigtiff {
            (8usize, 8usize, 20usize, 16usize)
        } else {
            (4, 2, 12, 8)
        };

        let tiles: Vec<Vec<Vec<u8>>> = images
            .iter()
            .map(|image| {
                let across = (image.width + self.tile_width - 1) / self.tile_width;
                let down = (image.height + self.tile_height - 1) / self.tile_height;
                (0..down)
                    .flat_map(|ti| (0..across).map(move |tj| (ti, tj)))
                    .map(|(ti, tj)| self.encode_tile(&w, image, ti, tj))
                    .collect()
            })
            .collect();
        let mut all_entries: Vec<Vec<Entry>> = images
            .iter()
            .zip(tiles.iter())
            .map(|(image, image_tiles)| {
                let counts: Vec<u64> = image_tiles.iter().map(|t| t.len() as u64).collect();
                self.entries(&w, image, &counts)
            })
            .collect();

        // Layout: header, then for each image its IFD followed by its out of line values,
        // then all tile data
        let mut offset = header_size;
        let mut ifd_offsets = vec![];
        let mut value_offsets: Vec<Vec<Option<usize>>> = vec![];
        for entries in all_entries.iter() {
            ifd_offsets.push(offset);
            offset += count_size + entries.len() * entry_size + offset_size;
            let mut image_value_offsets = vec![];
            for e in entries.iter() {
                if e.data.len() > offset_size {
                    image_value_offsets.push(Some(offset));
                    offset += e.data.len() + e.data.len() % 2;
                } else {
                    image_value_offsets.push(None);
                }
            }
            value_offsets.push(image_value_offsets);
        }
        for (entries, image_tiles) in all_entries.iter_mut().zip(tiles.iter()) {
            let mut tile_offsets = vec![];
            for t in image_tiles {
                tile_offsets.push(offset as u64);
                offset += t.len();
            }
            let data = if self.bigtiff {
                w.u64s(&tile_offsets)
            } else {
                w.u32s(&tile_offsets.iter().map(|v| *v as u32).collect::<Vec<_>>())
            };
            for e in entries.iter_mut().filter(|e| e.tag == 324) {
                e.data = data.clone();
            }
        }

        let mut out = vec![];
        out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        if self.bigtiff {
            out.extend(w.u16s(&[43, 8, 0]));
            out.extend(w.u64s(&[ifd_offsets[0] as u64]));
        } else {
            out.extend(w.u16s(&[42]));
            out.extend(w.u32s(&[ifd_offsets[0] as u32]));
        }
        let write_offset = |out: &mut Vec<u8>, v: usize| {
            if self.bigtiff {
                out.extend(w.u64s(&[v as u64]));
            } else {
                out.extend(w.u32s(&[v as u32]));
            }
        };
        for (k, entries) in all_entries.iter().enumerate() {
            assert_eq!(out.len(), ifd_offsets[k]);
            if self.bigtiff {
                out.extend(w.u64s(&[entries.len() as u64]));
            } else {
                out.extend(w.u16s(&[entries.len() as u16]));
            }
            for (e, value_offset) in entries.iter().zip(value_offsets[k].iter()) {
                out.extend(w.u16s(&[e.tag, e.field_type]));
                if self.bigtiff {
                    out.extend(w.u64s(&[e.count]));
                } else {
                    out.extend(w.u32s(&[e.count as u32]));
                }
                match value_offset {
                    Some(o) => write_offset(&mut out, *o),
                    None => {
                        let mut inline = e.data.clone();
                        inline.resize(offset_size, 0);
                        out.extend(inline);
                    }
                }
            }
            write_offset(&mut out, ifd_offsets.get(k + 1).copied().unwrap_or(0));
            for (e, value_offset) in entries.iter().zip(value_offsets[k].iter()) {
                if let Some(o) = value_offset {
                    assert_eq!(out.len(), *o);
                    out.extend(&e.data);
                    if e.data.len() % 2 == 1 {
                        out.push(0);
                    }
                }
            }
        }
        for image_tiles in tiles.iter() {
            for t in image_tiles {
                out.extend(t);
            }
        }
        out
    }
}
