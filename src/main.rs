fn main() -> anyhow::Result<()> {
    beaware_lib::run()
}
