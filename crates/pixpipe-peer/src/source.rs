//! Contracts for the code on either side of the transport.
//!
//! A camera driver feeds the sender through [`ImageSource`]; whatever stores
//! or displays frames on the receiving side implements [`ImageSink`]. The
//! transport never looks inside either.

use pixpipe_frame::Image;

/// Pull-style producer of frames.
///
/// `next_frame` is synchronous and always yields an image once the source is
/// initialised; device errors are the source's own business.
pub trait ImageSource {
    fn next_frame(&mut self) -> Image;
}

impl<F> ImageSource for F
where
    F: FnMut() -> Image,
{
    fn next_frame(&mut self) -> Image {
        self()
    }
}

/// Consumer of decoded frames. Takes ownership of each image.
pub trait ImageSink {
    fn consume(&mut self, image: Image);
}

impl ImageSink for Vec<Image> {
    fn consume(&mut self, image: Image) {
        self.push(image);
    }
}

#[cfg(test)]
mod tests {
    use pixpipe_frame::BitDepth;

    use super::*;

    #[test]
    fn closures_are_sources() {
        let mut value = 0u16;
        let mut source = || {
            value += 1;
            Image::filled(1, 1, BitDepth::Sixteen, value).unwrap()
        };

        assert_eq!(source.next_frame().sample(0, 0), Some(1));
        assert_eq!(source.next_frame().sample(0, 0), Some(2));
    }

    #[test]
    fn vec_collects_frames() {
        let mut sink: Vec<Image> = Vec::new();
        sink.consume(Image::filled(1, 1, BitDepth::Eight, 3).unwrap());
        assert_eq!(sink.len(), 1);
    }
}
