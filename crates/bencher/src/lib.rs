//! Generated inputs shared by the benchmarks.

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    input: Vec<u8>,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, input: Vec<u8>) -> Self {
        Self { name, group, input }
    }

    pub fn small(name: &'static str, input: Vec<u8>) -> Self {
        Self::new(name, TestGroup::Small, input)
    }

    pub fn normal(name: &'static str, input: Vec<u8>) -> Self {
        Self::new(name, TestGroup::Normal, input)
    }

    pub fn large(name: &'static str, input: Vec<u8>) -> Self {
        Self::new(name, TestGroup::Large, input)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

/// A browser-like `GET` with `extra_headers` additional header lines.
pub fn get_request(extra_headers: usize) -> Vec<u8> {
    let mut request = String::from(
        "GET /static/app.js?v=1842 HTTP/1.1\r\n\
         Host: www.example.com\r\n\
         User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0\r\n\
         Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8\r\n\
         Accept-Language: en-US,en;q=0.5\r\n\
         Accept-Encoding: gzip, deflate, br\r\n\
         Cookie: session=7f3a9c1e; theme=dark\r\n\
         Connection: keep-alive\r\n",
    );
    for i in 0..extra_headers {
        request.push_str(&format!("X-Custom-Header-{i}: value-{i}-{}\r\n", "x".repeat(32)));
    }
    request.push_str("\r\n");
    request.into_bytes()
}

/// A chunked body of `size` bytes split into chunks of `chunk_size`, with the last chunk.
pub fn chunked_body(size: usize, chunk_size: usize) -> Vec<u8> {
    let mut body = Vec::with_capacity(size + size / chunk_size.max(1) * 8 + 5);
    let mut left = size;
    while left > 0 {
        let n = left.min(chunk_size);
        body.extend_from_slice(format!("{n:x}\r\n").as_bytes());
        body.extend((0..n).map(|i| b'a' + (i % 26) as u8));
        body.extend_from_slice(b"\r\n");
        left -= n;
    }
    body.extend_from_slice(b"0\r\n\r\n");
    body
}

/// A `multipart/form-data` body with `parts` file parts of `size` bytes each.
pub fn multipart_body(boundary: &str, parts: usize, size: usize) -> Vec<u8> {
    let mut body = Vec::new();
    for i in 0..parts {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file{i}\"; filename=\"f{i}.bin\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend((0..size).map(|j| (j % 251) as u8));
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
